//! The MIPS32 target: register file, frame layout and instruction
//! selection.

pub mod codegen;
pub mod frame;
pub mod register;

pub use self::{
    codegen::codegen,
    frame::{Mips, MipsFrame, WORD},
    register::{MipsReg, MipsRegisters, ALLOCATABLE},
};
