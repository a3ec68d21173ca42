//! Partitioning of a canonical statement list into basic blocks.

use super::{
    temp::{IrContext, Label},
    tree::Stm,
};

/// A straight-line run of statements that starts with exactly one `Label`
/// and ends with exactly one `Jump` or `CJump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub stms: Vec<Stm>,
}

impl BasicBlock {
    pub fn label(&self) -> &Label {
        match self.stms.first() {
            Some(Stm::Label(label)) => label,
            other => unreachable!("basic block must start with a label, got {:?}", other),
        }
    }

    pub fn last(&self) -> &Stm {
        self.stms.last().expect("basic block is never empty")
    }

    /// The labels control may transfer to when leaving the block.
    pub fn successors(&self) -> Vec<Label> {
        match self.last() {
            Stm::Jump(_, targets) => targets.clone(),
            Stm::CJump(_, _, _, t, f) => vec![t.clone(), f.clone()],
            other => unreachable!("basic block must end with a jump, got {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlocks {
    pub blocks: Vec<BasicBlock>,
    /// Where control goes after the last block. Not defined by any block.
    pub done: Label,
}

/// Build basic blocks from `stms`. Total over arbitrary input: statements
/// not preceded by a label get a fresh one, blocks that run into a label get
/// an explicit jump to it, and the last block jumps to `done`.
pub fn basic_blocks(ctx: &mut IrContext, stms: Vec<Stm>) -> BasicBlocks {
    let done = ctx.new_label();
    let mut blocks = Vec::new();
    let mut current: Option<Vec<Stm>> = None;

    for stm in stms {
        let mut block = match current.take() {
            Some(block) => block,
            None => match stm {
                Stm::Label(_) => Vec::new(),
                _ => vec![Stm::Label(ctx.new_label())],
            },
        };

        match stm {
            Stm::Label(label) => {
                if !block.is_empty() {
                    // fall-through into a label: close with an explicit jump
                    block.push(Stm::jump_to(label.clone()));
                    blocks.push(BasicBlock { stms: block });
                    block = Vec::new();
                }
                block.push(Stm::Label(label));
                current = Some(block);
            }
            stm if stm.is_jump() => {
                block.push(stm);
                blocks.push(BasicBlock { stms: block });
            }
            stm => {
                block.push(stm);
                current = Some(block);
            }
        }
    }

    if let Some(mut block) = current {
        block.push(Stm::jump_to(done.clone()));
        blocks.push(BasicBlock { stms: block });
    }

    log::debug!("built {} basic blocks", blocks.len());
    BasicBlocks { blocks, done }
}
