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

//! Tree intermediate representation shared by the generator and the
//! backend.
//!
//! # Pipeline
//!
//! The method body generator produces one `Stm` per procedure. That tree is
//! rewritten by [`canon::linearize`] into a flat list of canonical
//! statements, partitioned by [`basic_blocks::basic_blocks`] and finally
//! re-linearized by [`trace::trace_schedule`]. The output of the last step is
//! what instruction selection consumes.
//!
//! # Identity
//!
//! `Temp`s and `Label`s are only meaningful relative to the [`IrContext`]
//! that created them. A context lives for one compilation unit; there is no
//! process-wide counter.

#[macro_use]
extern crate derive_more;

pub mod basic_blocks;
pub mod canon;
pub mod frame;
pub mod temp;
pub mod trace;
pub mod tree;

pub use self::{
    frame::{Access, Frame, Procedure, Target},
    temp::{IrContext, Label, Temp},
    tree::{BinOp, Exp, RelOp, Stm},
};
