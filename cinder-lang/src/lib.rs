//! The Cinder language.
//!
//! A small C-like language with `int`, `bool`, pointers and type aliases,
//! compiled to x86-64 assembly. This crate provides the [`Frontend`] and
//! [`CodeGenerator`] the driver sequences.
//!
//! # Module Organization
//!
//! - [`lexer`]: Tokens and source positions
//! - [`parser`]: Recursive-descent parser producing the [`ast`]
//! - [`resolve`]: Name and type resolution
//! - [`typeck`]: Type-table, lvalue and type checks
//! - [`ir`]: Intermediate code and lowering
//! - [`codegen`]: x86-64 code generation
//!
//! [`Frontend`]: cinder_core::Frontend
//! [`CodeGenerator`]: cinder_core::CodeGenerator

pub mod ast;
pub mod codegen;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod typeck;

use std::path::Path;

use cinder_core::{DiagnosticSink, Frontend, Options, Result, SyntaxError, TypeTable};
use tracing::debug;

pub use ast::Module;
pub use codegen::{Assembly, X86_64CodeGenerator};
pub use ir::Ir;

/// Frontend for Cinder source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CinderFrontend;

impl CinderFrontend {
    pub fn new() -> Self {
        Self
    }
}

impl Frontend for CinderFrontend {
    type Ast = Module;
    type Ir = Ir;

    fn parse_file(
        &self,
        path: &Path,
        _options: &Options,
        _sink: &mut DiagnosticSink,
    ) -> Result<Module> {
        let source = cinder_core::read_source(path)?;
        match parser::parse_module(path, source.clone()) {
            Ok(module) => {
                debug!(
                    path = %path.display(),
                    tokens = module.tokens.len(),
                    items = module.items.len(),
                    "parsed"
                );
                Ok(module)
            }
            Err(err) => {
                let len = err.span.len().max(1);
                Err(SyntaxError::new(path, source, err.span.start.offset, len, err.message).into())
            }
        }
    }

    fn resolve_locals(&self, ast: &mut Module, sink: &mut DiagnosticSink) -> Result<()> {
        Ok(resolve::resolve_locals(ast, sink)?)
    }

    fn resolve_types(
        &self,
        ast: &mut Module,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        Ok(resolve::resolve_types(ast, types, sink)?)
    }

    fn check_type_table(
        &self,
        ast: &Module,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        Ok(typeck::check_type_table(ast, types, sink)?)
    }

    fn check_dereferences(
        &self,
        ast: &Module,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        Ok(typeck::check_dereferences(ast, types, sink)?)
    }

    fn check_types(
        &self,
        ast: &mut Module,
        types: &TypeTable,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        Ok(typeck::check_types(ast, types, sink)?)
    }

    fn generate_ir(
        &self,
        ast: Module,
        _types: &TypeTable,
        _sink: &mut DiagnosticSink,
    ) -> Result<Ir> {
        Ok(ir::generate_ir(&ast))
    }
}
