//! Maximal munch instruction selection.
//!
//! Every statement of a canonical, trace scheduled list is covered by the
//! largest tile that matches at its root, children not covered by the tile
//! are munched recursively into fresh temps.

use super::{
    frame::{MipsFrame, WORD},
    register::{MipsReg, CALLER_SAVES},
};
use crate::{assem::Instruction, LoweringError};
use ir::{BinOp, Exp, IrContext, Label, RelOp, Stm, Temp};

pub fn codegen(
    ctx: &mut IrContext,
    frame: &mut MipsFrame,
    stms: &[Stm],
) -> Result<Vec<Instruction>, LoweringError> {
    let mut codegen = Codegen {
        ctx,
        frame,
        instrs: vec![],
    };
    for stm in stms {
        codegen.munch_stm(stm)?;
    }
    Ok(codegen.instrs)
}

struct Codegen<'a> {
    ctx: &'a mut IrContext,
    frame: &'a mut MipsFrame,
    instrs: Vec<Instruction>,
}

fn fits_imm16(value: i32) -> bool {
    value >= i32::from(i16::min_value()) && value <= i32::from(i16::max_value())
}

fn fits_neg_imm16(value: i32) -> bool {
    value.checked_neg().map_or(false, fits_imm16)
}

fn fits_uimm16(value: i32) -> bool {
    value >= 0 && value <= i32::from(u16::max_value())
}

fn no_match(tree: &impl ToString) -> LoweringError {
    LoweringError::NoMatchingPattern {
        tree: tree.to_string(),
    }
}

fn branch_mnemonic(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "beq",
        RelOp::Ne => "bne",
        RelOp::Lt => "blt",
        RelOp::Gt => "bgt",
        RelOp::Le => "ble",
        RelOp::Ge => "bge",
        RelOp::Ult => "bltu",
        RelOp::Ule => "bleu",
        RelOp::Ugt => "bgtu",
        RelOp::Uge => "bgeu",
    }
}

impl<'a> Codegen<'a> {
    fn emit(&mut self, instr: Instruction) {
        self.instrs.push(instr);
    }

    fn reg(&self, reg: MipsReg) -> Temp {
        self.frame.reg(reg)
    }

    /// `base + offset` addressing, falling back to offset 0.
    fn munch_address(&mut self, addr: &Exp) -> Result<(i32, Option<Temp>), LoweringError> {
        use self::Exp::*;
        match addr {
            BinOp(self::BinOp::Plus, base, offset) => match (&**base, &**offset) {
                (base, Const(n)) if fits_imm16(*n) => Ok((*n, Some(self.munch_exp(base)?))),
                (Const(n), base) if fits_imm16(*n) => Ok((*n, Some(self.munch_exp(base)?))),
                _ => Ok((0, Some(self.munch_exp(addr)?))),
            },
            BinOp(self::BinOp::Minus, base, offset) => match &**offset {
                Const(n) if fits_neg_imm16(*n) => Ok((-*n, Some(self.munch_exp(base)?))),
                _ => Ok((0, Some(self.munch_exp(addr)?))),
            },
            Const(n) if fits_imm16(*n) => Ok((*n, None)),
            _ => Ok((0, Some(self.munch_exp(addr)?))),
        }
    }

    fn munch_stm(&mut self, stm: &Stm) -> Result<(), LoweringError> {
        match stm {
            Stm::Move(Exp::Mem(addr), src) => {
                let src = self.munch_exp(src)?;
                match self.munch_address(addr)? {
                    (offset, Some(base)) => self.emit(Instruction::oper(
                        format!("sw %s0, {}(%s1)", offset),
                        vec![],
                        vec![src, base],
                    )),
                    (offset, None) => self.emit(Instruction::oper(
                        format!("sw %s0, {}($zero)", offset),
                        vec![],
                        vec![src],
                    )),
                }
            }
            Stm::Move(Exp::Temp(dst), Exp::Call(func, args)) => {
                self.munch_call(func, args)?;
                let rv = self.reg(MipsReg::V0);
                self.emit(Instruction::mov(*dst, rv));
            }
            Stm::Move(Exp::Temp(dst), Exp::Const(n)) => {
                self.emit(Self::load_const(*dst, *n));
            }
            Stm::Move(Exp::Temp(dst), Exp::Mem(addr)) => {
                let load = self.load(*dst, addr)?;
                self.emit(load);
            }
            Stm::Move(Exp::Temp(dst), Exp::BinOp(op, left, right)) => {
                self.munch_binop(*op, left, right, Some(*dst))?;
            }
            Stm::Move(Exp::Temp(dst), src) => {
                let src = self.munch_exp(src)?;
                self.emit(Instruction::mov(*dst, src));
            }
            Stm::Move(..) => return Err(no_match(stm)),
            Stm::Label(label) => self.emit(Instruction::label(label.clone())),
            Stm::Jump(Exp::Name(target), targets) => self.emit(Instruction::jump(
                format!("j {}", target),
                vec![],
                targets.clone(),
            )),
            Stm::Jump(addr, targets) => {
                let addr = self.munch_exp(addr)?;
                self.emit(Instruction::jump("jr %s0", vec![addr], targets.clone()));
            }
            Stm::CJump(op, left, right, t, f) => self.munch_cjump(*op, left, right, t, f)?,
            Stm::Expr(Exp::Call(func, args)) => self.munch_call(func, args)?,
            Stm::Expr(Exp::Temp(_)) | Stm::Expr(Exp::Const(_)) | Stm::Expr(Exp::Name(_)) => (),
            Stm::Expr(exp) => {
                self.munch_exp(exp)?;
            }
            Stm::Seq(..) => return Err(no_match(stm)),
        }
        Ok(())
    }

    fn munch_cjump(
        &mut self,
        op: RelOp,
        left: &Exp,
        right: &Exp,
        t: &Label,
        f: &Label,
    ) -> Result<(), LoweringError> {
        let targets = vec![t.clone(), f.clone()];
        match (left, right) {
            (_, Exp::Const(n)) => {
                let left = self.munch_exp(left)?;
                self.emit(Instruction::jump(
                    format!("{} %s0, {}, %j0", branch_mnemonic(op), n),
                    vec![left],
                    targets,
                ));
            }
            (Exp::Const(n), _) => {
                let right = self.munch_exp(right)?;
                self.emit(Instruction::jump(
                    format!("{} %s0, {}, %j0", branch_mnemonic(op.commute()), n),
                    vec![right],
                    targets,
                ));
            }
            _ => {
                let left = self.munch_exp(left)?;
                let right = self.munch_exp(right)?;
                self.emit(Instruction::jump(
                    format!("{} %s0, %s1, %j0", branch_mnemonic(op)),
                    vec![left, right],
                    targets,
                ));
            }
        }
        Ok(())
    }

    /// Evaluates the arguments, moves the first ones into the argument
    /// registers and stores the rest into the outgoing argument area.
    fn munch_call(&mut self, func: &Exp, args: &[Exp]) -> Result<(), LoweringError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.munch_exp(arg)?);
        }

        let sp = self.reg(MipsReg::Sp);
        let mut arg_regs = vec![];
        for (idx, value) in values.into_iter().enumerate() {
            match MipsReg::arg(idx) {
                Some(reg) => {
                    let reg = self.reg(reg);
                    self.emit(Instruction::mov(reg, value));
                    arg_regs.push(reg);
                }
                None => self.emit(Instruction::oper(
                    format!("sw %s0, {}(%s1)", idx as i32 * WORD),
                    vec![],
                    vec![value, sp],
                )),
            }
        }
        self.frame.note_call(args.len());

        let call_defs = self.call_defs();
        match func {
            Exp::Name(label) => {
                self.emit(Instruction::oper(
                    format!("jal {}", label),
                    call_defs,
                    arg_regs,
                ));
            }
            func => {
                let mut src = vec![self.munch_exp(func)?];
                src.extend(arg_regs);
                self.emit(Instruction::oper("jalr %s0", call_defs, src));
            }
        }
        Ok(())
    }

    /// Everything a call may overwrite.
    fn call_defs(&self) -> Vec<Temp> {
        let mut defs = vec![
            self.reg(MipsReg::Ra),
            self.reg(MipsReg::V0),
            self.reg(MipsReg::Fp),
        ];
        defs.extend(self.frame.register_file().temps(&CALLER_SAVES));
        defs
    }

    fn load_const(dst: Temp, value: i32) -> Instruction {
        if fits_imm16(value) {
            Instruction::oper(format!("addi %d0, $zero, {}", value), vec![dst], vec![])
        } else {
            Instruction::oper(format!("li %d0, {}", value), vec![dst], vec![])
        }
    }

    fn load(&mut self, dst: Temp, addr: &Exp) -> Result<Instruction, LoweringError> {
        Ok(match self.munch_address(addr)? {
            (offset, Some(base)) => {
                Instruction::oper(format!("lw %d0, {}(%s0)", offset), vec![dst], vec![base])
            }
            (offset, None) => {
                Instruction::oper(format!("lw %d0, {}($zero)", offset), vec![dst], vec![])
            }
        })
    }

    fn munch_exp(&mut self, exp: &Exp) -> Result<Temp, LoweringError> {
        use self::Exp::*;
        match exp {
            Temp(temp) => Ok(*temp),
            Const(n) => {
                let dst = self.ctx.new_temp();
                self.emit(Self::load_const(dst, *n));
                Ok(dst)
            }
            Name(label) => {
                let dst = self.ctx.new_temp();
                self.emit(Instruction::oper(
                    format!("la %d0, {}", label),
                    vec![dst],
                    vec![],
                ));
                Ok(dst)
            }
            Mem(addr) => {
                let dst = self.ctx.new_temp();
                let load = self.load(dst, addr)?;
                self.emit(load);
                Ok(dst)
            }
            BinOp(op, left, right) => self.munch_binop(*op, left, right, None),
            Call(..) | ESeq(..) => Err(no_match(exp)),
        }
    }

    /// Computes `left op right` into `dst`, or into a fresh temp if there is
    /// no destination yet.
    fn munch_binop(
        &mut self,
        op: BinOp,
        left: &Exp,
        right: &Exp,
        dst: Option<Temp>,
    ) -> Result<Temp, LoweringError> {
        use self::BinOp::*;

        let immediate = match (op, left, right) {
            (Plus, left, Exp::Const(n)) | (Plus, Exp::Const(n), left) if fits_imm16(*n) => {
                Some(("addi", left, *n))
            }
            (Minus, left, Exp::Const(n)) if fits_neg_imm16(*n) => Some(("addi", left, -*n)),
            (And, left, Exp::Const(n)) | (And, Exp::Const(n), left) if fits_uimm16(*n) => {
                Some(("andi", left, *n))
            }
            (Or, left, Exp::Const(n)) | (Or, Exp::Const(n), left) if fits_uimm16(*n) => {
                Some(("ori", left, *n))
            }
            (Xor, left, Exp::Const(n)) | (Xor, Exp::Const(n), left) if fits_uimm16(*n) => {
                Some(("xori", left, *n))
            }
            (Lshift, left, Exp::Const(n)) if *n >= 0 && *n < 32 => Some(("sll", left, *n)),
            (Rshift, left, Exp::Const(n)) if *n >= 0 && *n < 32 => Some(("srl", left, *n)),
            (Arshift, left, Exp::Const(n)) if *n >= 0 && *n < 32 => Some(("sra", left, *n)),
            _ => None,
        };
        if let Some((mnemonic, operand, value)) = immediate {
            let operand = self.munch_exp(operand)?;
            let dst = dst.unwrap_or_else(|| self.ctx.new_temp());
            self.emit(Instruction::oper(
                format!("{} %d0, %s0, {}", mnemonic, value),
                vec![dst],
                vec![operand],
            ));
            return Ok(dst);
        }

        let left = self.munch_exp(left)?;
        let right = self.munch_exp(right)?;
        let dst = dst.unwrap_or_else(|| self.ctx.new_temp());

        let (mnemonic, result) = match op {
            Mul => ("mult", "mflo"),
            Div => ("div", "mflo"),
            Mod => ("div", "mfhi"),
            op => {
                let mnemonic = match op {
                    Plus => "add",
                    Minus => "sub",
                    And => "and",
                    Or => "or",
                    Xor => "xor",
                    Lshift => "sllv",
                    Rshift => "srlv",
                    _ => "srav",
                };
                self.emit(Instruction::oper(
                    format!("{} %d0, %s0, %s1", mnemonic),
                    vec![dst],
                    vec![left, right],
                ));
                return Ok(dst);
            }
        };

        // hi/lo are not allocatable, the result is fetched right away
        self.emit(Instruction::oper(
            format!("{} %s0, %s1", mnemonic),
            vec![],
            vec![left, right],
        ));
        self.emit(Instruction::oper(
            format!("{} %d0", result),
            vec![dst],
            vec![],
        ));
        Ok(dst)
    }
}
