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

//! Translates the typed AST into tree IR, one [`ir::Procedure`] per method.
//!
//! # Generated Labels
//!
//! A dollar sign (`$`) is a valid character in an assembler label, but not
//! in `MiniJava`, which is why it separates class and member: method `m` of
//! class `C` is `C$m`, the vtable of `C` is `C$vtable`. The static `main`
//! method is emitted under the entry point name of the runtime library.
//!
//! # Object Layout
//!
//! Word 0 of every object points to the vtable of its class, field `i` is at
//! word `i + 1`. Word 0 of an array holds its length, element `i` is at word
//! `i + 1`.

pub mod ast;
pub mod method_body_generator;
pub mod program_generator;
pub mod runtime;
pub mod safety;

#[cfg(test)]
mod test_frame;

#[macro_use]
extern crate derive_more;

pub use self::{
    method_body_generator::MethodBodyGenerator, program_generator::ProgramGenerator,
    runtime::{Mjrt, RTLib, RuntimeFunction},
};
use failure::Fail;

/// Enable or disable behaviour during IR construction
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub safety: Vec<safety::Flag>,
}

impl Options {
    pub fn check_null(&self) -> bool {
        safety::enabled(&self.safety, safety::Flag::CheckNull)
    }

    pub fn check_array_bounds(&self) -> bool {
        safety::enabled(&self.safety, safety::Flag::CheckArrayBounds)
    }
}

/// Static program-structure errors. The front end rejects all of these, so
/// seeing one means the typed AST was built inconsistently.
#[derive(Debug, Fail)]
pub enum TranslateError {
    #[fail(display = "expression without a value used as {}", usage)]
    VoidValue { usage: &'static str },
    #[fail(display = "break outside of a loop")]
    BreakOutsideLoop,
    #[fail(display = "continue outside of a loop")]
    ContinueOutsideLoop,
    #[fail(display = "undefined variable '{}'", name)]
    UndefinedVariable { name: String },
    #[fail(display = "cannot assign to {} expression", expr)]
    NotAssignable { expr: ast::ExprDiscriminants },
    #[fail(display = "'this' used in static method {}", method)]
    ThisInStaticMethod { method: String },
}
