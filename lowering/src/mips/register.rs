use crate::assem::TempMap;
use ir::{IrContext, Temp};
use std::collections::{BTreeMap, HashMap};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// The 32 general purpose registers, in hardware numbering order.
#[derive(Display, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, EnumIter)]
pub enum MipsReg {
    #[display(fmt = "$zero")]
    Zero,
    #[display(fmt = "$at")]
    At,
    #[display(fmt = "$v0")]
    V0,
    #[display(fmt = "$v1")]
    V1,
    #[display(fmt = "$a0")]
    A0,
    #[display(fmt = "$a1")]
    A1,
    #[display(fmt = "$a2")]
    A2,
    #[display(fmt = "$a3")]
    A3,
    #[display(fmt = "$t0")]
    T0,
    #[display(fmt = "$t1")]
    T1,
    #[display(fmt = "$t2")]
    T2,
    #[display(fmt = "$t3")]
    T3,
    #[display(fmt = "$t4")]
    T4,
    #[display(fmt = "$t5")]
    T5,
    #[display(fmt = "$t6")]
    T6,
    #[display(fmt = "$t7")]
    T7,
    #[display(fmt = "$s0")]
    S0,
    #[display(fmt = "$s1")]
    S1,
    #[display(fmt = "$s2")]
    S2,
    #[display(fmt = "$s3")]
    S3,
    #[display(fmt = "$s4")]
    S4,
    #[display(fmt = "$s5")]
    S5,
    #[display(fmt = "$s6")]
    S6,
    #[display(fmt = "$s7")]
    S7,
    #[display(fmt = "$t8")]
    T8,
    #[display(fmt = "$t9")]
    T9,
    #[display(fmt = "$k0")]
    K0,
    #[display(fmt = "$k1")]
    K1,
    #[display(fmt = "$gp")]
    Gp,
    #[display(fmt = "$sp")]
    Sp,
    #[display(fmt = "$fp")]
    Fp,
    #[display(fmt = "$ra")]
    Ra,
}

pub const ARGS: [MipsReg; 4] = [MipsReg::A0, MipsReg::A1, MipsReg::A2, MipsReg::A3];

#[rustfmt::skip]
pub const CALLER_SAVES: [MipsReg; 15] = [
    MipsReg::T0, MipsReg::T1, MipsReg::T2, MipsReg::T3, MipsReg::T4,
    MipsReg::T5, MipsReg::T6, MipsReg::T7, MipsReg::T8, MipsReg::T9,
    MipsReg::A0, MipsReg::A1, MipsReg::A2, MipsReg::A3,
    MipsReg::V1,
];

/// The colors available to the register allocator, in order of preference.
#[rustfmt::skip]
pub static ALLOCATABLE: [MipsReg; 24] = [
    MipsReg::V0, MipsReg::V1,
    MipsReg::A0, MipsReg::A1, MipsReg::A2, MipsReg::A3,
    MipsReg::T0, MipsReg::T1, MipsReg::T2, MipsReg::T3, MipsReg::T4,
    MipsReg::T5, MipsReg::T6, MipsReg::T7, MipsReg::T8, MipsReg::T9,
    MipsReg::S0, MipsReg::S1, MipsReg::S2, MipsReg::S3,
    MipsReg::S4, MipsReg::S5, MipsReg::S6, MipsReg::S7,
];

impl MipsReg {
    /// The register that passes the `idx`th argument, if it is passed in a
    /// register at all.
    pub fn arg(idx: usize) -> Option<Self> {
        ARGS.get(idx).cloned()
    }

    pub fn is_caller_save(self) -> bool {
        CALLER_SAVES.contains(&self)
    }

    pub fn is_callee_save(self) -> bool {
        match self {
            MipsReg::S0
            | MipsReg::S1
            | MipsReg::S2
            | MipsReg::S3
            | MipsReg::S4
            | MipsReg::S5
            | MipsReg::S6
            | MipsReg::S7 => true,
            _ => false,
        }
    }
}

/// One precolored temp per physical register.
///
/// Created once per [`IrContext`], all frames of a compilation unit share
/// the same temps, so `$v0` is the same node in every interference graph.
#[derive(Debug)]
pub struct MipsRegisters {
    temps: Vec<Temp>,
    regs: HashMap<Temp, MipsReg>,
}

impl MipsRegisters {
    pub fn new(ctx: &mut IrContext) -> Self {
        let mut temps = Vec::new();
        let mut regs = HashMap::new();
        for reg in MipsReg::iter() {
            let temp = ctx.new_temp();
            temps.push(temp);
            regs.insert(temp, reg);
        }
        Self { temps, regs }
    }

    pub fn temp(&self, reg: MipsReg) -> Temp {
        self.temps[reg as usize]
    }

    pub fn reg(&self, temp: Temp) -> Option<MipsReg> {
        self.regs.get(&temp).cloned()
    }

    pub fn temps(&self, regs: &[MipsReg]) -> Vec<Temp> {
        regs.iter().map(|&reg| self.temp(reg)).collect()
    }

    pub fn all(&self) -> Vec<Temp> {
        self.temps.clone()
    }

    /// The fixed coloring the allocator starts from.
    pub fn precolored(&self) -> BTreeMap<Temp, MipsReg> {
        self.regs.iter().map(|(&temp, &reg)| (temp, reg)).collect()
    }
}

impl TempMap for MipsRegisters {
    fn lookup(&self, temp: Temp) -> Option<String> {
        self.reg(temp).map(|reg| reg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_numbering() {
        assert_eq!(MipsReg::iter().count(), 32);
        assert_eq!(MipsReg::Sp as usize, 29);
        assert_eq!(MipsReg::Ra as usize, 31);
        assert_eq!(MipsReg::A0.to_string(), "$a0");
    }

    #[test]
    fn register_classes() {
        assert_eq!(MipsReg::arg(1), Some(MipsReg::A1));
        assert_eq!(MipsReg::arg(4), None);
        assert!(MipsReg::T9.is_caller_save());
        assert!(!MipsReg::S0.is_caller_save());
        assert!(MipsReg::S7.is_callee_save());
        assert!(!ALLOCATABLE.contains(&MipsReg::Sp));
        assert!(!ALLOCATABLE.contains(&MipsReg::Zero));
    }

    #[test]
    fn precolored_temps_are_distinct() {
        let mut ctx = IrContext::new();
        let regs = MipsRegisters::new(&mut ctx);
        let fp = regs.temp(MipsReg::Fp);
        assert_eq!(regs.reg(fp), Some(MipsReg::Fp));
        assert_eq!(regs.lookup(fp), Some("$fp".to_owned()));
        assert_eq!(regs.precolored().len(), 32);

        let other = ctx.new_temp();
        assert_eq!(regs.reg(other), None);
    }
}
