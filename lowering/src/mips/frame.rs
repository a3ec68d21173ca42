//! Frame layout of the MIPS o32 calling convention.
//!
//! The first four arguments arrive in `$a0`-`$a3`, argument `i` has its
//! home slot at `i * 4($fp)` in the caller's outgoing argument area.
//! Locals that live in memory are allocated below the frame pointer.

use super::register::{MipsReg, MipsRegisters, ARGS, CALLER_SAVES};
use crate::assem::Instruction;
use ir::{Access, Exp, Frame, IrContext, Label, Stm, Target, Temp};
use std::rc::Rc;

pub const WORD: i32 = 4;

pub struct Mips {
    registers: Rc<MipsRegisters>,
}

impl Mips {
    pub fn new(ctx: &mut IrContext) -> Self {
        Self {
            registers: Rc::new(MipsRegisters::new(ctx)),
        }
    }

    pub fn registers(&self) -> &MipsRegisters {
        &self.registers
    }
}

impl Target for Mips {
    type Frame = MipsFrame;

    fn new_frame(&self, ctx: &mut IrContext, name: Label, escapes: &[bool]) -> MipsFrame {
        let formals = escapes
            .iter()
            .enumerate()
            .map(|(idx, &escapes)| {
                if escapes || idx >= ARGS.len() {
                    Access::InFrame(idx as i32 * WORD)
                } else {
                    Access::InReg(ctx.new_temp())
                }
            })
            .collect();

        MipsFrame {
            name,
            formals,
            num_locals: 0,
            max_outgoing_args: 0,
            registers: Rc::clone(&self.registers),
        }
    }
}

#[derive(Debug)]
pub struct MipsFrame {
    name: Label,
    formals: Vec<Access>,
    num_locals: i32,
    max_outgoing_args: usize,
    registers: Rc<MipsRegisters>,
}

impl MipsFrame {
    pub fn register_file(&self) -> &MipsRegisters {
        &self.registers
    }

    pub fn reg(&self, reg: MipsReg) -> Temp {
        self.registers.temp(reg)
    }

    /// Record a call with `num_args` arguments made from this procedure.
    pub fn note_call(&mut self, num_args: usize) {
        self.max_outgoing_args = self.max_outgoing_args.max(num_args);
    }

    pub fn max_outgoing_args(&self) -> usize {
        self.max_outgoing_args
    }

    /// Number of locals allocated in memory.
    pub fn num_locals(&self) -> i32 {
        self.num_locals
    }

    /// Keep the registers that are live at the procedure's exit alive until
    /// its very end, so the allocator does not reuse them for temps.
    pub fn proc_entry_exit2(&self, mut body: Vec<Instruction>) -> Vec<Instruction> {
        let sink = [
            MipsReg::Zero,
            MipsReg::Ra,
            MipsReg::Sp,
            MipsReg::Fp,
            MipsReg::V0,
        ];
        body.push(Instruction::Oper {
            assem: String::new(),
            dst: vec![],
            src: self.registers.temps(&sink),
            jump: Some(vec![]),
        });
        body
    }
}

impl Frame for MipsFrame {
    fn word_size(&self) -> i32 {
        WORD
    }

    fn name(&self) -> &Label {
        &self.name
    }

    fn formals(&self) -> &[Access] {
        &self.formals
    }

    fn alloc_local(&mut self, ctx: &mut IrContext, in_frame: bool) -> Access {
        if in_frame {
            self.num_locals += 1;
            Access::InFrame(-self.num_locals * WORD)
        } else {
            Access::InReg(ctx.new_temp())
        }
    }

    fn fp(&self) -> Temp {
        self.reg(MipsReg::Fp)
    }

    fn rv(&self) -> Temp {
        self.reg(MipsReg::V0)
    }

    fn ra(&self) -> Temp {
        self.reg(MipsReg::Ra)
    }

    fn arg_regs(&self) -> Vec<Temp> {
        self.registers.temps(&ARGS)
    }

    fn caller_saves(&self) -> Vec<Temp> {
        self.registers.temps(&CALLER_SAVES)
    }

    fn registers(&self) -> Vec<Temp> {
        self.registers.all()
    }

    fn external_call(&self, ctx: &mut IrContext, name: &str, args: Vec<Exp>) -> Exp {
        Exp::call(Exp::Name(ctx.named_label(name)), args)
    }

    fn proc_entry_exit1(&self, body: Stm) -> Stm {
        let fp = Exp::Temp(self.fp());
        let mut stms: Vec<Stm> = self
            .formals
            .iter()
            .zip(self.arg_regs())
            .map(|(formal, arg)| Stm::Move(formal.exp(fp.clone()), Exp::Temp(arg)))
            .collect();
        stms.push(body);
        Stm::seq_all(stms)
    }
}
