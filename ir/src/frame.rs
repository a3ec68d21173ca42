//! The stack/register layout of one procedure, as seen by the target
//! independent parts of the compiler.

use super::{
    temp::{IrContext, Label, Temp},
    tree::{BinOp, Exp, Stm},
};

/// Where a formal or local variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// At `offset` bytes from the frame pointer.
    InFrame(i32),
    /// In a temp for the whole lifetime of the procedure.
    InReg(Temp),
}

impl Access {
    /// The expression that reads (or, as a move destination, writes) the
    /// variable, given an expression for the frame pointer.
    pub fn exp(self, fp: Exp) -> Exp {
        match self {
            Access::InFrame(0) => Exp::mem(fp),
            Access::InFrame(offset) => Exp::mem(Exp::binop(BinOp::Plus, fp, Exp::Const(offset))),
            Access::InReg(temp) => Exp::Temp(temp),
        }
    }
}

pub trait Frame {
    fn word_size(&self) -> i32;

    /// The label of the procedure's entry point.
    fn name(&self) -> &Label;

    /// Accesses of the formal parameters, as seen from inside the callee.
    fn formals(&self) -> &[Access];

    /// Allocate a new local variable. Locals that escape must live in the
    /// frame, all others may be kept in a temp.
    fn alloc_local(&mut self, ctx: &mut IrContext, in_frame: bool) -> Access;

    fn fp(&self) -> Temp;
    fn rv(&self) -> Temp;
    fn ra(&self) -> Temp;

    /// The registers used to pass the first arguments, in order.
    fn arg_regs(&self) -> Vec<Temp>;
    fn caller_saves(&self) -> Vec<Temp>;

    /// All physical registers of the target.
    fn registers(&self) -> Vec<Temp>;

    fn num_registers(&self) -> usize {
        self.registers().len()
    }

    /// Call a function of the runtime library.
    fn external_call(&self, ctx: &mut IrContext, name: &str, args: Vec<Exp>) -> Exp;

    /// Wrap a procedure body with the moves that copy register-passed
    /// arguments into the formals' accesses.
    fn proc_entry_exit1(&self, body: Stm) -> Stm;
}

/// A code generation target: knows how to lay out frames.
pub trait Target {
    type Frame: Frame;

    /// A frame for a procedure called `name`. `escapes[i]` tells whether the
    /// `i`-th formal must live in memory.
    fn new_frame(&self, ctx: &mut IrContext, name: Label, escapes: &[bool]) -> Self::Frame;
}

/// A procedure ready for the backend.
#[derive(Debug)]
pub struct Procedure<F> {
    pub frame: F,
    pub body: Stm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_frame_access_adds_offset() {
        let mut ctx = IrContext::new();
        let fp = ctx.new_temp();
        assert_eq!(
            Access::InFrame(-8).exp(Exp::Temp(fp)),
            Exp::mem(Exp::binop(BinOp::Plus, Exp::Temp(fp), Exp::Const(-8)))
        );
        assert_eq!(
            Access::InFrame(0).exp(Exp::Temp(fp)),
            Exp::mem(Exp::Temp(fp))
        );
    }

    #[test]
    fn in_reg_access_ignores_frame_pointer() {
        let mut ctx = IrContext::new();
        let fp = ctx.new_temp();
        let t = ctx.new_temp();
        assert_eq!(Access::InReg(t).exp(Exp::Temp(fp)), Exp::Temp(t));
    }
}
