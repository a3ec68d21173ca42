//! Control flow between the instructions of one procedure.
//!
//! Every instruction except labels becomes a node. An instruction with jump
//! targets has an edge to the first instruction after each target label,
//! all other instructions fall through to the next node.

use crate::{
    assem::{Instruction, Operands},
    LoweringError,
};
use ir::{Label, Temp};
use petgraph::{
    graph::{Graph, NodeIndex},
    Direction::{Incoming, Outgoing},
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FlowNode {
    /// Position in the instruction list the graph was built from.
    pub instr: usize,
    pub defs: Vec<Temp>,
    pub uses: Vec<Temp>,
    pub is_move: bool,
}

/// Nodes are numbered in instruction order, so `NodeIndex::index` doubles
/// as the position among the non-label instructions.
#[derive(Debug)]
pub struct FlowGraph {
    pub graph: Graph<FlowNode, ()>,
}

impl FlowGraph {
    pub fn node(&self, node: NodeIndex) -> &FlowNode {
        &self.graph[node]
    }

    pub fn defs(&self, node: NodeIndex) -> &[Temp] {
        &self.graph[node].defs
    }

    pub fn uses(&self, node: NodeIndex) -> &[Temp] {
        &self.graph[node].uses
    }

    pub fn is_move(&self, node: NodeIndex) -> bool {
        self.graph[node].is_move
    }

    pub fn succ(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Outgoing)
    }

    pub fn pred(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Incoming)
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
}

pub fn flow_graph(instrs: &[Instruction]) -> Result<FlowGraph, LoweringError> {
    let mut graph = Graph::new();
    // a label binds to the next non-label instruction, `None` if there is none
    let mut labels: HashMap<&Label, Option<NodeIndex>> = HashMap::new();
    let mut pending = vec![];
    let mut ids = vec![];

    for (idx, instr) in instrs.iter().enumerate() {
        if let Instruction::Label { label, .. } = instr {
            pending.push(label);
            continue;
        }
        let node = graph.add_node(FlowNode {
            instr: idx,
            defs: instr.dst_operands().to_vec(),
            uses: instr.src_operands().to_vec(),
            is_move: instr.is_move(),
        });
        for label in pending.drain(..) {
            labels.insert(label, Some(node));
        }
        ids.push(node);
    }
    for label in pending {
        labels.insert(label, None);
    }

    for (pos, &node) in ids.iter().enumerate() {
        match instrs[graph[node].instr].jumps() {
            Some(targets) => {
                for target in targets {
                    match labels.get(target) {
                        Some(Some(to)) => {
                            graph.update_edge(node, *to, ());
                        }
                        Some(None) => (),
                        None => {
                            return Err(LoweringError::UnboundLabel {
                                label: target.to_string(),
                            });
                        }
                    }
                }
            }
            None => {
                if let Some(&next) = ids.get(pos + 1) {
                    graph.update_edge(node, next, ());
                }
            }
        }
    }

    log::debug!(
        "flow graph with {} nodes and {} edges for {} instructions",
        graph.node_count(),
        graph.edge_count(),
        instrs.len()
    );
    Ok(FlowGraph { graph })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::IrContext;

    fn succs(flow: &FlowGraph, node: usize) -> Vec<usize> {
        let mut succs: Vec<usize> = flow.succ(NodeIndex::new(node)).map(|n| n.index()).collect();
        succs.sort();
        succs
    }

    #[test]
    fn straight_line_falls_through() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let b = ctx.new_temp();
        let instrs = vec![
            Instruction::oper("addi %d0, $zero, 1", vec![a], vec![]),
            Instruction::mov(b, a),
            Instruction::oper("", vec![], vec![b]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        assert_eq!(flow.len(), 3);
        assert_eq!(succs(&flow, 0), vec![1]);
        assert_eq!(succs(&flow, 1), vec![2]);
        assert!(succs(&flow, 2).is_empty());
        assert!(flow.is_move(flow.nodes().nth(1).unwrap()));
    }

    #[test]
    fn jumps_target_the_instruction_after_the_label() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let top = ctx.new_label();
        let done = ctx.new_label();
        let instrs = vec![
            Instruction::label(top.clone()),
            Instruction::oper("addi %d0, %s0, 1", vec![a], vec![a]),
            Instruction::jump("blt %s0, 10, %j0", vec![a], vec![top.clone(), done.clone()]),
            Instruction::label(done),
            Instruction::mov(a, a),
        ];
        let flow = flow_graph(&instrs).unwrap();
        assert_eq!(flow.len(), 3);
        assert_eq!(succs(&flow, 1), vec![0, 2]);
        assert_eq!(flow.node(flow.nodes().nth(2).unwrap()).instr, 4);
    }

    #[test]
    fn unconditional_jump_does_not_fall_through() {
        let mut ctx = IrContext::new();
        let end = ctx.new_label();
        let instrs = vec![
            Instruction::jump("j %j0", vec![], vec![end.clone()]),
            Instruction::oper("nop", vec![], vec![]),
            Instruction::label(end),
            Instruction::oper("nop", vec![], vec![]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        assert_eq!(succs(&flow, 0), vec![2]);
        assert_eq!(succs(&flow, 1), vec![2]);
        let mut preds: Vec<usize> = flow.pred(NodeIndex::new(2)).map(|n| n.index()).collect();
        preds.sort();
        assert_eq!(preds, vec![0, 1]);
    }

    #[test]
    fn branch_with_equal_targets_has_one_edge() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let next = ctx.new_label();
        let instrs = vec![
            Instruction::jump("beq %s0, 0, %j0", vec![a], vec![next.clone(), next.clone()]),
            Instruction::label(next),
            Instruction::oper("", vec![], vec![a]),
        ];
        let flow = flow_graph(&instrs).unwrap();
        assert_eq!(flow.graph.edge_count(), 1);
        assert_eq!(succs(&flow, 0), vec![1]);
    }

    #[test]
    fn trailing_label_has_no_node() {
        let mut ctx = IrContext::new();
        let done = ctx.new_label();
        let instrs = vec![
            Instruction::jump("j %j0", vec![], vec![done.clone()]),
            Instruction::label(done),
        ];
        let flow = flow_graph(&instrs).unwrap();
        assert_eq!(flow.len(), 1);
        assert!(succs(&flow, 0).is_empty());
    }

    #[test]
    fn jump_to_unknown_label_fails() {
        let mut ctx = IrContext::new();
        let nowhere = ctx.named_label("nowhere");
        let instrs = vec![Instruction::jump("j %j0", vec![], vec![nowhere])];
        match flow_graph(&instrs) {
            Err(LoweringError::UnboundLabel { label }) => assert_eq!(label, "nowhere"),
            other => panic!("unexpected result {:?}", other.map(|flow| flow.len())),
        }
    }
}
