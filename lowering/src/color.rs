//! Graph coloring register allocation by simplify and select.
//!
//! Nodes of degree below the number of colors are removed from the graph
//! and pushed onto a stack until only precolored nodes remain. If every
//! remaining node has significant degree, the one with the lowest spill
//! cost per degree is pushed optimistically. Popping the stack, each node
//! gets the first color not used by an already colored neighbor. Without
//! such a color the node would have to be spilled, which is not supported.

use crate::{assem::TempMap, live_variable_analysis::InterferenceGraph, LoweringError};
use ir::Temp;
use petgraph::graph::NodeIndex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

/// The physical register of every temp.
#[derive(Debug, Clone)]
pub struct Allocation<R> {
    colors: BTreeMap<Temp, R>,
}

impl<R: Copy> Allocation<R> {
    pub fn get(&self, temp: Temp) -> Option<R> {
        self.colors.get(&temp).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Temp, R)> + '_ {
        self.colors.iter().map(|(&temp, &reg)| (temp, reg))
    }
}

impl<R: Display> TempMap for Allocation<R> {
    fn lookup(&self, temp: Temp) -> Option<String> {
        self.colors.get(&temp).map(ToString::to_string)
    }
}

pub fn color<R: Copy + PartialEq>(
    ig: &InterferenceGraph,
    precolored: &BTreeMap<Temp, R>,
    registers: &[R],
) -> Result<Allocation<R>, LoweringError> {
    let k = registers.len();
    let mut colors: BTreeMap<NodeIndex, R> = BTreeMap::new();
    let mut remaining = BTreeSet::new();
    for node in ig.nodes() {
        match precolored.get(&ig.temp(node)) {
            Some(&reg) => {
                colors.insert(node, reg);
            }
            None => {
                remaining.insert(node);
            }
        }
    }

    let mut adj: Vec<BTreeSet<NodeIndex>> = ig.nodes().map(|node| ig.adjacent(node)).collect();
    let mut stack = Vec::with_capacity(remaining.len());

    loop {
        let low_degree = remaining
            .iter()
            .find(|node| adj[node.index()].len() < k)
            .cloned();

        let node = match low_degree {
            Some(node) => node,
            None => match potential_spill(ig, &adj, &remaining) {
                Some(node) => {
                    log::debug!(
                        "{} has significant degree {}, pushed optimistically",
                        ig.temp(node),
                        adj[node.index()].len()
                    );
                    node
                }
                None => break,
            },
        };

        // the node keeps its own edge list for select
        remaining.remove(&node);
        for neighbor in adj[node.index()].clone() {
            adj[neighbor.index()].remove(&node);
        }
        stack.push(node);
    }

    while let Some(node) = stack.pop() {
        for neighbor in adj[node.index()].clone() {
            adj[neighbor.index()].insert(node);
        }

        let used: Vec<R> = adj[node.index()]
            .iter()
            .filter_map(|neighbor| colors.get(neighbor))
            .cloned()
            .collect();

        match registers.iter().find(|reg| !used.contains(*reg)) {
            Some(&reg) => {
                colors.insert(node, reg);
            }
            None => {
                return Err(LoweringError::SpillRequired {
                    temp: ig.temp(node),
                });
            }
        }
    }

    let mut allocation: BTreeMap<Temp, R> = precolored.clone();
    allocation.extend(colors.into_iter().map(|(node, reg)| (ig.temp(node), reg)));
    Ok(Allocation { colors: allocation })
}

/// The node with the smallest spill cost relative to its degree.
fn potential_spill(
    ig: &InterferenceGraph,
    adj: &[BTreeSet<NodeIndex>],
    remaining: &BTreeSet<NodeIndex>,
) -> Option<NodeIndex> {
    // cost(a) / deg(a) < cost(b) / deg(b)
    remaining.iter().cloned().min_by(|&a, &b| {
        let lhs = ig.spill_cost(a) * adj[b.index()].len();
        let rhs = ig.spill_cost(b) * adj[a.index()].len();
        lhs.cmp(&rhs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assem::Instruction, flow_graph::flow_graph, live_variable_analysis::*};
    use ir::IrContext;

    fn graph(instrs: &[Instruction]) -> InterferenceGraph {
        let flow = flow_graph(instrs).unwrap();
        let live = liveness(&flow);
        interference_graph(&flow, &live)
    }

    fn assert_valid(ig: &InterferenceGraph, allocation: &Allocation<&'static str>) {
        for node in ig.nodes() {
            let temp = ig.temp(node);
            let reg = allocation.get(temp).expect("uncolored temp");
            for neighbor in ig.neighbors(temp) {
                assert_ne!(Some(reg), allocation.get(neighbor), "{} and {}", temp, neighbor);
            }
        }
    }

    /// All `n` temps are live at the same time.
    fn clique(ctx: &mut IrContext, n: usize) -> (Vec<Temp>, Vec<Instruction>) {
        let temps: Vec<Temp> = (0..n).map(|_| ctx.new_temp()).collect();
        let mut instrs: Vec<_> = temps
            .iter()
            .map(|&t| Instruction::oper("addi %d0, $zero, 1", vec![t], vec![]))
            .collect();
        instrs.push(Instruction::oper("", vec![], temps.clone()));
        (temps, instrs)
    }

    #[test]
    fn clique_gets_distinct_colors() {
        let mut ctx = IrContext::new();
        let (temps, instrs) = clique(&mut ctx, 3);
        let ig = graph(&instrs);
        let allocation = color(&ig, &BTreeMap::new(), &["r0", "r1", "r2"]).unwrap();
        assert_valid(&ig, &allocation);

        let mut used: Vec<_> = temps.iter().map(|&t| allocation.get(t).unwrap()).collect();
        used.sort();
        assert_eq!(used, vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn clique_larger_than_registers_requires_spill() {
        let mut ctx = IrContext::new();
        let (temps, instrs) = clique(&mut ctx, 3);
        let ig = graph(&instrs);
        match color(&ig, &BTreeMap::new(), &["r0", "r1"]) {
            Err(LoweringError::SpillRequired { temp }) => assert!(temps.contains(&temp)),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("three live temps colored with two registers"),
        }
    }

    #[test]
    fn precolored_neighbors_are_avoided() {
        let mut ctx = IrContext::new();
        let (temps, instrs) = clique(&mut ctx, 2);
        let ig = graph(&instrs);
        let precolored: BTreeMap<_, _> = vec![(temps[0], "r0")].into_iter().collect();
        let allocation = color(&ig, &precolored, &["r0", "r1"]).unwrap();
        assert_eq!(allocation.get(temps[0]), Some("r0"));
        assert_eq!(allocation.get(temps[1]), Some("r1"));
        assert_eq!(allocation.lookup(temps[1]), Some("r1".to_owned()));
    }

    #[test]
    fn unrelated_temps_share_a_register() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let b = ctx.new_temp();
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![a], vec![]),
            Instruction::oper("", vec![], vec![a]),
            Instruction::oper("addi %d0, $zero, 2", vec![b], vec![]),
            Instruction::oper("", vec![], vec![b]),
        ];
        let ig = graph(&instrs);
        let allocation = color(&ig, &BTreeMap::new(), &["r0"]).unwrap();
        assert_eq!(allocation.get(a), Some("r0"));
        assert_eq!(allocation.get(b), Some("r0"));
    }

    #[test]
    fn optimistic_push_can_still_color() {
        // every node of a 4-cycle has degree 2, but two colors suffice
        let mut ctx = IrContext::new();
        let t: Vec<Temp> = (0..4).map(|_| ctx.new_temp()).collect();
        let mut ig = InterferenceGraph::new();
        for i in 0..4 {
            ig.add_interference(t[i], t[(i + 1) % 4]);
        }
        let allocation = color(&ig, &BTreeMap::new(), &["r0", "r1"]).unwrap();
        assert_valid(&ig, &allocation);
        assert_eq!(allocation.get(t[0]), allocation.get(t[2]));
    }

    #[test]
    fn cheap_nodes_are_pushed_first() {
        let mut ctx = IrContext::new();
        let (temps, instrs) = clique(&mut ctx, 3);
        let mut instrs = instrs;
        // make temps[0] and temps[1] more expensive to spill
        instrs.push(Instruction::oper("", vec![], vec![temps[0], temps[1]]));
        let ig = graph(&instrs);
        let adj: Vec<_> = ig.nodes().map(|node| ig.adjacent(node)).collect();
        let remaining = ig.nodes().collect();
        let spill = potential_spill(&ig, &adj, &remaining).unwrap();
        assert_eq!(ig.temp(spill), temps[2]);
    }
}
