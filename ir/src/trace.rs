//! Trace scheduling: orders basic blocks so that most `CJump`s fall through
//! to their false label and most `Jump`s vanish.

use super::{
    basic_blocks::BasicBlocks,
    temp::{IrContext, Label},
    tree::{Exp, Stm},
};
use std::collections::HashMap;

/// Linearize `blocks` into a statement list in which every `CJump` is
/// immediately followed by `Label(false_label)`. The list ends with the
/// `done` label of the blocks.
pub fn trace_schedule(ctx: &mut IrContext, blocks: BasicBlocks) -> Vec<Stm> {
    let BasicBlocks { blocks, done } = blocks;
    let order = traces(&blocks);
    log::debug!("scheduled {} blocks", order.len());

    let mut blocks: Vec<Option<_>> = blocks.into_iter().map(Some).collect();
    let scheduled = order
        .into_iter()
        .filter_map(|idx| blocks[idx].take())
        .flat_map(|block| block.stms)
        .chain(std::iter::once(Stm::Label(done)));

    fix_jumps(ctx, scheduled)
}

/// Greedy trace construction: start a trace at the first unmarked block and
/// keep following an unmarked successor, preferring the false target of a
/// `CJump`.
fn traces(blocks: &[super::basic_blocks::BasicBlock]) -> Vec<usize> {
    let by_label: HashMap<&Label, usize> = blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| (block.label(), idx))
        .collect();
    let mut marked = vec![false; blocks.len()];
    let mut order = Vec::with_capacity(blocks.len());

    for start in 0..blocks.len() {
        let mut cur = start;
        while !marked[cur] {
            marked[cur] = true;
            order.push(cur);

            let unmarked = |label: &Label| by_label.get(label).cloned().filter(|idx| !marked[*idx]);
            let next = match blocks[cur].last() {
                Stm::CJump(_, _, _, t, f) => unmarked(f).or_else(|| unmarked(t)),
                Stm::Jump(Exp::Name(target), _) => unmarked(target),
                _ => None,
            };
            match next {
                Some(next) => cur = next,
                None => break,
            }
        }
    }

    order
}

enum Fixup {
    None,
    /// The `CJump` got a new false label; place it next, followed by a jump
    /// to the original false label.
    NewFalseLabel(Label, Label),
    DropJump,
}

/// Single pass over the statements that rewrites the `CJump` or `Jump`
/// preceding each label.
fn fix_jumps(ctx: &mut IrContext, stms: impl Iterator<Item = Stm>) -> Vec<Stm> {
    let mut out: Vec<Stm> = Vec::new();

    for stm in stms {
        if let Stm::Label(label) = &stm {
            let fixup = match out.last_mut() {
                Some(Stm::CJump(op, _, _, t, f)) => {
                    if f == label {
                        Fixup::None
                    } else if t == label {
                        *op = op.negate();
                        std::mem::swap(t, f);
                        Fixup::None
                    } else {
                        let new_false = ctx.new_label();
                        let old_false = std::mem::replace(f, new_false.clone());
                        Fixup::NewFalseLabel(new_false, old_false)
                    }
                }
                Some(Stm::Jump(Exp::Name(target), _)) if target == label => Fixup::DropJump,
                _ => Fixup::None,
            };
            match fixup {
                Fixup::None => (),
                Fixup::NewFalseLabel(new_false, old_false) => {
                    out.push(Stm::Label(new_false));
                    out.push(Stm::jump_to(old_false));
                }
                Fixup::DropJump => {
                    out.pop();
                }
            }
        }
        out.push(stm);
    }

    out
}
