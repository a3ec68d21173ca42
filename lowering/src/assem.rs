//! Target instructions with unallocated operands.
//!
//! The assembly text of an instruction is a template: `%s<i>` is the
//! `i`-th source temp, `%d<i>` the `i`-th destination temp and `%j<i>` the
//! `i`-th jump target. Templates are resolved only when printing, against a
//! [`TempMap`] that knows the physical register of each temp.

use ir::{Label, Temp};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Oper {
        assem: String,
        dst: Vec<Temp>,
        src: Vec<Temp>,
        /// `None` falls through to the next instruction, `Some` transfers
        /// control to exactly the listed labels.
        jump: Option<Vec<Label>>,
    },
    Label {
        assem: String,
        label: Label,
    },
    /// A register to register copy. The allocator must not let `dst` and
    /// `src` interfere just because of this instruction.
    Move {
        assem: String,
        dst: Temp,
        src: Temp,
    },
}

pub trait Operands {
    fn src_operands(&self) -> &[Temp];
    fn dst_operands(&self) -> &[Temp];
}

impl Operands for Instruction {
    fn src_operands(&self) -> &[Temp] {
        match self {
            Instruction::Oper { src, .. } => src,
            Instruction::Move { src, .. } => std::slice::from_ref(src),
            Instruction::Label { .. } => &[],
        }
    }

    fn dst_operands(&self) -> &[Temp] {
        match self {
            Instruction::Oper { dst, .. } => dst,
            Instruction::Move { dst, .. } => std::slice::from_ref(dst),
            Instruction::Label { .. } => &[],
        }
    }
}

impl Instruction {
    pub fn oper(assem: impl Into<String>, dst: Vec<Temp>, src: Vec<Temp>) -> Self {
        Instruction::Oper {
            assem: assem.into(),
            dst,
            src,
            jump: None,
        }
    }

    pub fn jump(assem: impl Into<String>, src: Vec<Temp>, targets: Vec<Label>) -> Self {
        Instruction::Oper {
            assem: assem.into(),
            dst: vec![],
            src,
            jump: Some(targets),
        }
    }

    pub fn mov(dst: Temp, src: Temp) -> Self {
        Instruction::Move {
            assem: "move %d0, %s0".to_owned(),
            dst,
            src,
        }
    }

    pub fn label(label: Label) -> Self {
        Instruction::Label {
            assem: format!("{}:", label),
            label,
        }
    }

    pub fn assem(&self) -> &str {
        match self {
            Instruction::Oper { assem, .. }
            | Instruction::Label { assem, .. }
            | Instruction::Move { assem, .. } => assem,
        }
    }

    pub fn jumps(&self) -> Option<&[Label]> {
        match self {
            Instruction::Oper {
                jump: Some(targets),
                ..
            } => Some(targets),
            _ => None,
        }
    }

    pub fn is_move(&self) -> bool {
        match self {
            Instruction::Move { .. } => true,
            _ => false,
        }
    }

    /// The assembly text with all placeholders replaced. Temps unknown to
    /// `temps` are printed by their virtual name.
    pub fn format(&self, temps: &dyn TempMap) -> String {
        let assem = self.assem();
        let mut out = String::with_capacity(assem.len());
        let mut chars = assem.chars().peekable();

        while let Some(c) = chars.next() {
            let kind = match (c, chars.peek()) {
                ('%', Some(&kind)) if kind == 's' || kind == 'd' || kind == 'j' => kind,
                _ => {
                    out.push(c);
                    continue;
                }
            };
            chars.next();

            let mut idx = 0;
            let mut digits = 0;
            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                idx = idx * 10 + digit as usize;
                digits += 1;
                chars.next();
            }
            if digits == 0 {
                out.push('%');
                out.push(kind);
                continue;
            }

            let operand = match kind {
                's' => self.src_operands().get(idx).map(|&t| temp_name(temps, t)),
                'd' => self.dst_operands().get(idx).map(|&t| temp_name(temps, t)),
                _ => self
                    .jumps()
                    .and_then(|targets| targets.get(idx))
                    .map(Label::to_string),
            };
            match operand {
                Some(operand) => out.push_str(&operand),
                None => {
                    log::warn!("instruction '{}' has no operand %{}{}", assem, kind, idx);
                    out.push('%');
                    out.push(kind);
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }
}

fn temp_name(temps: &dyn TempMap, temp: Temp) -> String {
    temps.lookup(temp).unwrap_or_else(|| temp.to_string())
}

/// Names the physical register of a temp.
pub trait TempMap {
    fn lookup(&self, temp: Temp) -> Option<String>;
}

/// Prints every temp by its virtual name.
pub struct VirtualNames;

impl TempMap for VirtualNames {
    fn lookup(&self, _temp: Temp) -> Option<String> {
        None
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.format(&VirtualNames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::IrContext;
    use std::collections::HashMap;

    struct Named(HashMap<Temp, &'static str>);

    impl TempMap for Named {
        fn lookup(&self, temp: Temp) -> Option<String> {
            self.0.get(&temp).map(|name| name.to_string())
        }
    }

    #[test]
    fn placeholders_are_resolved() {
        let mut ctx = IrContext::new();
        let (a, b, c) = (ctx.new_temp(), ctx.new_temp(), ctx.new_temp());
        let instr = Instruction::oper("add %d0, %s0, %s1", vec![c], vec![a, b]);

        let names = Named(
            vec![(a, "$t0"), (b, "$t1"), (c, "$s0")]
                .into_iter()
                .collect(),
        );
        assert_eq!(instr.format(&names), "add $s0, $t0, $t1");
    }

    #[test]
    fn unknown_temps_keep_their_virtual_name() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let b = ctx.new_temp();
        let instr = Instruction::mov(b, a);
        assert_eq!(instr.to_string(), format!("move {}, {}", b, a));
    }

    #[test]
    fn jump_targets_are_resolved() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let t = ctx.named_label("yes");
        let f = ctx.named_label("no");
        let instr = Instruction::jump("bgez %s0, %j0", vec![a], vec![t, f]);
        assert_eq!(instr.to_string(), format!("bgez {}, yes", a));
        assert_eq!(instr.jumps().map(<[Label]>::len), Some(2));
    }

    #[test]
    fn percent_without_placeholder_is_kept() {
        let instr = Instruction::oper("# 100%", vec![], vec![]);
        assert_eq!(instr.to_string(), "# 100%");
    }

    #[test]
    fn moves_expose_single_operands() {
        let mut ctx = IrContext::new();
        let a = ctx.new_temp();
        let b = ctx.new_temp();
        let instr = Instruction::mov(b, a);
        assert!(instr.is_move());
        assert_eq!(instr.src_operands(), &[a]);
        assert_eq!(instr.dst_operands(), &[b]);
        assert!(Instruction::label(ctx.new_label()).src_operands().is_empty());
    }
}
