//! Pipeline orchestrator for the Cinder compiler.
//!
//! This crate sequences the stages of a build for each input file and
//! stops at the point the selected [`Mode`](cinder_core::Mode) asks for.
//!
//! # Module Organization
//!
//! - [`compiler`] - The orchestrator (`Compiler`) and its per-file flow
//! - [`dump`] - Which representation each dump mode prints, and when
//! - [`output`] - Writing generated text to a file or standard output
//! - [`stage`] - Stage names used in logs and diagnostics
//! - [`tools`] - External assembler and linker invocation

pub mod compiler;
pub mod dump;
pub mod output;
pub mod stage;
pub mod tools;

pub use compiler::{Compiled, Compiler};
pub use output::write_file;
pub use stage::Stage;
pub use tools::{CcLinker, GnuAssembler, ToolOutput, invoke};
