//! Core types for the Cinder compiler driver.
//!
//! This crate holds everything the pipeline orchestrator shares with its
//! collaborators: the stage selector, per-file pipeline state, build
//! options, the target type table, diagnostics and the error taxonomy, and
//! the traits a frontend, code generator, assembler and linker implement.

// Miette's derive macro generates code that triggers these warnings
#![allow(unused_assignments)]

mod diagnostic;
mod error;
mod mode;
mod options;
mod source;
mod toolchain;
mod types;

pub use diagnostic::{Diagnostic, DiagnosticSink, Severity};
pub use error::{
    CompileError, FileError, MissingUnit, OptionError, Result, SemanticError, SyntaxError,
    ToolError,
};
pub use mode::Mode;
pub use options::{
    DEFAULT_OUTPUT, Destination, LinkerOptions, Options, OptionsBuilder, STDOUT_SENTINEL,
};
pub use source::{Artifact, EXT_ASSEMBLY, EXT_OBJECT, EXT_SOURCE, SourceFile, SourceKind};
pub use toolchain::{Assembler, AssemblyCode, CodeGenerator, Dump, Frontend, Linker, SyntaxTree};
pub use types::{BuiltinType, TypeTable};

/// Read a source file, classifying failures as [`FileError`]s.
pub fn read_source(path: &std::path::Path) -> std::result::Result<String, FileError> {
    std::fs::read_to_string(path).map_err(|source| FileError::read(path, source))
}
