//! Contracts between the pipeline orchestrator and the components it drives.
//!
//! The orchestrator sequences stages and never looks inside a
//! representation; it only asks a representation to dump itself and hands
//! it to the next stage.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{DiagnosticSink, LinkerOptions, Options, Result, TypeTable, error::ToolError};

/// A representation that can print itself for `--dump-*` modes.
pub trait Dump {
    fn dump(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// A parsed source file.
pub trait SyntaxTree: Dump {
    /// Print the token stream the tree was parsed from.
    fn dump_tokens(&self, out: &mut dyn Write) -> io::Result<()>;

    /// The only statement of `main`, if `main` has exactly one.
    fn single_main_stmt(&self) -> Option<&dyn Dump>;

    /// The expression of that statement, if it is an expression.
    fn single_main_expr(&self) -> Option<&dyn Dump>;
}

/// Generated target assembly.
pub trait AssemblyCode: Dump {
    /// Render as assembler input text.
    fn to_source(&self) -> String;
}

/// Parser, resolvers, checkers and IR generation for one source language.
///
/// Stages report individual problems to the sink and return an error once
/// they cannot continue.
pub trait Frontend {
    type Ast: SyntaxTree;
    type Ir: Dump;

    /// Read and parse one file.
    fn parse_file(&self, path: &Path, options: &Options, sink: &mut DiagnosticSink)
    -> Result<Self::Ast>;

    /// Bind every name use to its declaration.
    fn resolve_locals(&self, ast: &mut Self::Ast, sink: &mut DiagnosticSink) -> Result<()>;

    /// Resolve every type expression against the file and the type table.
    fn resolve_types(
        &self,
        ast: &mut Self::Ast,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()>;

    /// Check that the type definitions visible to the file are consistent.
    fn check_type_table(
        &self,
        ast: &Self::Ast,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()>;

    /// Check lvalues and call targets.
    fn check_dereferences(
        &self,
        ast: &Self::Ast,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()>;

    /// Assign and check the type of every expression.
    fn check_types(
        &self,
        ast: &mut Self::Ast,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()>;

    /// Lower a checked tree to intermediate code.
    fn generate_ir(
        &self,
        ast: Self::Ast,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<Self::Ir>;
}

/// Turns intermediate code into target assembly.
pub trait CodeGenerator<Ir> {
    type Asm: AssemblyCode;

    fn generate(&self, ir: &Ir, options: &Options, sink: &mut DiagnosticSink) -> Result<Self::Asm>;
}

/// Turns assembly text into an object file.
pub trait Assembler {
    fn assemble(
        &self,
        src: &Path,
        dest: &Path,
        args: &[String],
        sink: &mut DiagnosticSink,
    ) -> std::result::Result<(), ToolError>;
}

/// Links object files into the final artifact.
pub trait Linker {
    fn generate_executable(
        &self,
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
        sink: &mut DiagnosticSink,
    ) -> std::result::Result<(), ToolError>;

    fn generate_shared_library(
        &self,
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
        sink: &mut DiagnosticSink,
    ) -> std::result::Result<(), ToolError>;
}
