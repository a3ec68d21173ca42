#![warn(
    clippy::print_stdout,
    clippy::unimplemented,
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::match_same_arms,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::use_self,
    clippy::use_debug
)]

//! Lowers the tree IR of a procedure to MIPS instructions with physical
//! registers.
//!
//! Each procedure runs through
//!
//! 1. canonicalization, basic blocks and trace scheduling (crate `ir`),
//! 2. maximal munch instruction selection ([`mips::codegen`]),
//! 3. flow graph, liveness and interference graph,
//! 4. graph coloring ([`color::color`]).
//!
//! Spilling is not implemented: a procedure that needs more registers than
//! available fails with [`LoweringError::SpillRequired`].

#[macro_use]
extern crate derive_more;

pub mod assem;
pub mod color;
pub mod flow_graph;
pub mod live_variable_analysis;
pub mod mips;

use self::{
    assem::{Instruction, Operands, TempMap},
    color::Allocation,
    mips::{MipsFrame, MipsReg, ALLOCATABLE},
};
use compiler_shared::timed_scope;
use failure::Fail;
use itertools::Itertools;
use ir::{
    basic_blocks::basic_blocks, canon, trace::trace_schedule, Frame, IrContext, Procedure, Stm,
    Temp,
};
use std::io;

/// Backend configuration.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Use at most this many of the allocatable registers.
    pub max_registers: Option<usize>,
}

impl Options {
    pub fn registers(&self) -> &'static [MipsReg] {
        match self.max_registers {
            Some(max) if max < ALLOCATABLE.len() => &ALLOCATABLE[..max],
            _ => &ALLOCATABLE,
        }
    }
}

#[derive(Debug, Fail)]
pub enum LoweringError {
    #[fail(display = "no instruction pattern matches {}", tree)]
    NoMatchingPattern { tree: String },
    #[fail(display = "cannot allocate a register for {}, spilling is not supported", temp)]
    SpillRequired { temp: Temp },
    #[fail(display = "jump to label {} which is not in the procedure", label)]
    UnboundLabel { label: String },
}

/// A procedure after register allocation.
#[derive(Debug)]
pub struct CompiledProcedure {
    pub frame: MipsFrame,
    /// The canonical statement list, before trace scheduling.
    pub canonical: Vec<Stm>,
    pub instructions: Vec<Instruction>,
    pub allocation: Allocation<MipsReg>,
}

impl CompiledProcedure {
    /// The instructions with every temp replaced by its register. Empty
    /// templates, like the liveness sink, are left out.
    pub fn assembly(&self) -> Vec<String> {
        self.instructions
            .iter()
            .filter(|instr| !instr.assem().is_empty())
            .map(|instr| match instr {
                Instruction::Label { .. } => instr.format(&self.allocation),
                _ => format!("\t{}", instr.format(&self.allocation)),
            })
            .collect()
    }

    pub fn emit(&self, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "{}:", self.frame.name())?;
        for line in self.assembly() {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

pub fn compile_procedure(
    ctx: &mut IrContext,
    procedure: Procedure<MipsFrame>,
    options: &Options,
) -> Result<CompiledProcedure, LoweringError> {
    let Procedure { mut frame, body } = procedure;
    let name = frame.name().clone();
    timed_scope!("lowering {}", name);

    let canonical = {
        timed_scope!("canonicalize {}", name);
        canon::linearize(ctx, body)
    };
    log::debug!("{}: {} canonical statements", name, canonical.len());

    let scheduled = {
        timed_scope!("trace scheduling {}", name);
        let blocks = basic_blocks(ctx, canonical.clone());
        log::debug!("{}: {} basic blocks", name, blocks.blocks.len());
        trace_schedule(ctx, blocks)
    };

    let instructions = {
        timed_scope!("instruction selection {}", name);
        let instructions = mips::codegen(ctx, &mut frame, &scheduled)?;
        frame.proc_entry_exit2(instructions)
    };
    for instr in &instructions {
        log::trace!("{}: {}", name, instr);
    }

    let allocation = {
        timed_scope!("register allocation {}", name);
        let flow = flow_graph::flow_graph(&instructions)?;
        let liveness = live_variable_analysis::liveness(&flow);
        let ig = live_variable_analysis::interference_graph(&flow, &liveness);
        color::color(&ig, &frame.register_file().precolored(), options.registers())?
    };
    log::debug!(
        "{}: {}",
        name,
        instructions
            .iter()
            .flat_map(|instr| instr.dst_operands().iter())
            .filter(|temp| frame.register_file().reg(**temp).is_none())
            .unique()
            .map(|temp| format!("{} -> {}", temp, allocation.lookup(*temp).unwrap_or_default()))
            .join(", ")
    );

    Ok(CompiledProcedure {
        frame,
        canonical,
        instructions,
        allocation,
    })
}

/// Compile every procedure and write the allocated instructions to `out`.
/// Phase timings are reported afterwards if requested by the environment.
pub fn run_backend(
    ctx: &mut IrContext,
    procedures: Vec<Procedure<MipsFrame>>,
    options: &Options,
    out: &mut impl io::Write,
) -> Result<(), failure::Error> {
    writeln!(out, "\t.text")?;
    for procedure in procedures {
        let compiled = compile_procedure(ctx, procedure, options)?;
        compiled.emit(out)?;
    }
    compiler_shared::timing::print()?;
    Ok(())
}
