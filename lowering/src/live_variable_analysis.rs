//! Live-variable analysis on the flow graph and the interference graph
//! derived from it.

use crate::flow_graph::FlowGraph;
use ir::Temp;
use petgraph::{
    graph::{Graph, NodeIndex},
    Undirected,
};
use std::collections::{BTreeMap, BTreeSet};

/// Live-in and live-out sets, indexed by flow node.
#[derive(Debug, Clone)]
pub struct Liveness {
    pub live_in: Vec<BTreeSet<Temp>>,
    pub live_out: Vec<BTreeSet<Temp>>,
    /// Number of passes over the graph that changed at least one set.
    pub iterations: usize,
}

impl Liveness {
    pub fn live_in(&self, node: NodeIndex) -> &BTreeSet<Temp> {
        &self.live_in[node.index()]
    }

    pub fn live_out(&self, node: NodeIndex) -> &BTreeSet<Temp> {
        &self.live_out[node.index()]
    }
}

/// Solves
///
/// ```text
/// in[n]  = use[n] ∪ (out[n] − def[n])
/// out[n] = ∪ { in[s] | s ∈ succ[n] }
/// ```
///
/// by iterating to a fixpoint. Nodes are visited in reverse order, which
/// settles straight-line code in a single pass.
pub fn liveness(flow: &FlowGraph) -> Liveness {
    let mut live_in = vec![BTreeSet::new(); flow.len()];
    let mut live_out = vec![BTreeSet::new(); flow.len()];
    let mut iterations = 0;

    loop {
        let mut changed = false;
        for node in flow.nodes().rev() {
            let out: BTreeSet<Temp> = flow
                .succ(node)
                .flat_map(|succ| live_in[succ.index()].iter().cloned())
                .collect();

            let defs = flow.defs(node);
            let mut new_in: BTreeSet<Temp> = flow.uses(node).iter().cloned().collect();
            new_in.extend(out.iter().filter(|temp| !defs.contains(temp)).cloned());

            if new_in != live_in[node.index()] || out != live_out[node.index()] {
                changed = true;
                live_in[node.index()] = new_in;
                live_out[node.index()] = out;
            }
        }
        if !changed {
            break;
        }
        iterations += 1;
    }

    log::debug!("liveness converged after {} iterations", iterations);
    Liveness {
        live_in,
        live_out,
        iterations,
    }
}

/// Undirected, every node is weighted with its temp.
#[derive(Debug)]
pub struct InterferenceGraph {
    pub graph: Graph<Temp, (), Undirected>,
    nodes: BTreeMap<Temp, NodeIndex>,
    /// Register to register copies as `(src, dst)`, candidates for
    /// coalescing.
    pub moves: Vec<(Temp, Temp)>,
    /// Number of defs and uses of each node's temp.
    spill_costs: Vec<usize>,
}

impl Default for InterferenceGraph {
    fn default() -> Self {
        Self {
            graph: Graph::new_undirected(),
            nodes: BTreeMap::new(),
            moves: vec![],
            spill_costs: vec![],
        }
    }
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node of `temp`, created on first use.
    pub fn ensure_node(&mut self, temp: Temp) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&temp) {
            return node;
        }
        let node = self.graph.add_node(temp);
        self.spill_costs.push(0);
        self.nodes.insert(temp, node);
        node
    }

    pub fn add_interference(&mut self, a: Temp, b: Temp) {
        let a = self.ensure_node(a);
        let b = self.ensure_node(b);
        if a != b {
            self.graph.update_edge(a, b, ());
        }
    }

    pub fn node(&self, temp: Temp) -> Option<NodeIndex> {
        self.nodes.get(&temp).cloned()
    }

    pub fn temp(&self, node: NodeIndex) -> Temp {
        self.graph[node]
    }

    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = NodeIndex> {
        (0..self.graph.node_count()).map(NodeIndex::new)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Interfering nodes, ordered by index.
    pub fn adjacent(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph.neighbors(node).collect()
    }

    pub fn spill_cost(&self, node: NodeIndex) -> usize {
        self.spill_costs[node.index()]
    }

    pub fn interferes(&self, a: Temp, b: Temp) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    pub fn neighbors(&self, temp: Temp) -> Vec<Temp> {
        self.node(temp)
            .map(|node| {
                self.adjacent(node)
                    .into_iter()
                    .map(|n| self.temp(n))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Every temp defined at a node interferes with every temp live out of it.
/// A move's destination does not interfere with its own source.
pub fn interference_graph(flow: &FlowGraph, liveness: &Liveness) -> InterferenceGraph {
    let mut ig = InterferenceGraph::new();

    for node in flow.nodes() {
        for &temp in flow.defs(node).iter().chain(flow.uses(node)) {
            let idx = ig.ensure_node(temp);
            ig.spill_costs[idx.index()] += 1;
        }
    }

    for node in flow.nodes() {
        let uses = flow.uses(node);
        let is_move = flow.is_move(node);
        if is_move {
            ig.moves.push((uses[0], flow.defs(node)[0]));
        }

        for &def in flow.defs(node) {
            for &live in liveness.live_out(node) {
                if live == def || (is_move && uses.contains(&live)) {
                    continue;
                }
                ig.add_interference(def, live);
            }
        }
    }

    log::debug!(
        "interference graph with {} nodes, {} edges and {} moves",
        ig.graph.node_count(),
        ig.graph.edge_count(),
        ig.moves.len()
    );
    ig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assem::Instruction, flow_graph::flow_graph};
    use ir::IrContext;

    fn temps(ctx: &mut IrContext, n: usize) -> Vec<Temp> {
        (0..n).map(|_| ctx.new_temp()).collect()
    }

    fn set(temps: &[Temp]) -> BTreeSet<Temp> {
        temps.iter().cloned().collect()
    }

    #[test]
    fn straight_line_converges_in_one_iteration() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 3);
        // a := 1; b := a + 1; use b
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![t[0]], vec![]),
            Instruction::oper("addi %d0, %s0, 1", vec![t[1]], vec![t[0]]),
            Instruction::oper("", vec![], vec![t[1]]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        let live = liveness(&flow);

        assert_eq!(live.iterations, 1);
        assert_eq!(live.live_in[0], set(&[]));
        assert_eq!(live.live_out[0], set(&[t[0]]));
        assert_eq!(live.live_in[1], set(&[t[0]]));
        assert_eq!(live.live_out[1], set(&[t[1]]));
        assert_eq!(live.live_in[2], set(&[t[1]]));
        assert_eq!(live.live_out[2], set(&[]));
    }

    #[test]
    fn loop_carried_temps_stay_live() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 2);
        let top = ctx.new_label();
        let done = ctx.new_label();
        // i := 0; top: i := i + 1; if i < n goto top; done: use n
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 0", vec![t[0]], vec![]),
            Instruction::label(top.clone()),
            Instruction::oper("addi %d0, %s0, 1", vec![t[0]], vec![t[0]]),
            Instruction::jump("blt %s0, %s1, %j0", vec![t[0], t[1]], vec![top, done.clone()]),
            Instruction::label(done),
            Instruction::oper("", vec![], vec![t[1]]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        let live = liveness(&flow);

        assert_eq!(live.live_in[0], set(&[t[1]]));
        assert_eq!(live.live_out[2], set(&[t[0], t[1]]));
        assert_eq!(live.live_in[1], set(&[t[0], t[1]]));
        assert!(live.iterations >= 1);

        let ig = interference_graph(&flow, &live);
        assert!(ig.interferes(t[0], t[1]));
        assert!(ig.interferes(t[1], t[0]));
        // i is defined twice while n is live, still a single edge
        assert_eq!(ig.graph.edge_count(), 1);
    }

    #[test]
    fn move_does_not_make_source_and_destination_interfere() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 3);
        // a := 1; b := a; c := a + b (a and b both live after the move)
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![t[0]], vec![]),
            Instruction::mov(t[1], t[0]),
            Instruction::oper("add %d0, %s0, %s1", vec![t[2]], vec![t[0], t[1]]),
            Instruction::oper("", vec![], vec![t[2]]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        let live = liveness(&flow);
        let ig = interference_graph(&flow, &live);

        assert!(!ig.interferes(t[0], t[1]));
        assert_eq!(ig.moves, vec![(t[0], t[1])]);
        assert_eq!(ig.graph.edge_count(), 0);
        assert!(ig.neighbors(t[2]).is_empty());
    }

    #[test]
    fn move_destination_interferes_with_other_live_temps() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 3);
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![t[0]], vec![]),
            Instruction::oper("addi %d0, $zero, 2", vec![t[2]], vec![]),
            Instruction::mov(t[1], t[0]),
            Instruction::oper("", vec![], vec![t[1], t[2]]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        let live = liveness(&flow);
        let ig = interference_graph(&flow, &live);

        assert!(ig.interferes(t[1], t[2]));
        assert!(ig.interferes(t[0], t[2]));
        assert!(!ig.interferes(t[0], t[1]));
    }

    #[test]
    fn every_temp_gets_a_node() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 2);
        // t1 is defined but dead
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![t[1]], vec![]),
            Instruction::oper("", vec![], vec![t[0]]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        let live = liveness(&flow);
        let ig = interference_graph(&flow, &live);

        assert!(ig.node(t[0]).is_some());
        assert!(ig.node(t[1]).is_some());
        assert!(ig.interferes(t[1], t[0]));
        let node = ig.node(t[1]).unwrap();
        assert_eq!(ig.spill_cost(node), 1);
        assert_eq!(ig.temp(node), t[1]);
    }

    #[test]
    fn interference_edges_are_undirected_and_unique() {
        let mut ctx = IrContext::new();
        let t = temps(&mut ctx, 3);
        let mut ig = InterferenceGraph::new();
        ig.add_interference(t[0], t[1]);
        ig.add_interference(t[1], t[0]);
        ig.add_interference(t[2], t[2]);

        assert_eq!(ig.len(), 3);
        assert_eq!(ig.graph.edge_count(), 1);
        assert_eq!(ig.neighbors(t[0]), vec![t[1]]);
        assert_eq!(ig.neighbors(t[1]), vec![t[0]]);
        assert!(ig.neighbors(t[2]).is_empty());
    }
}
