//! Dump dispatch.
//!
//! After each stage the orchestrator asks the matching function here
//! whether the active mode wants that stage's representation. A `true`
//! return means the representation was printed and the file is done.

use std::{io::Write, path::Path};

use cinder_core::{AssemblyCode, CompileError, Dump, MissingUnit, Mode, Result, SyntaxTree};

/// Dumps taken right after parsing.
pub fn dump_parsed<A: SyntaxTree>(
    ast: &A,
    path: &Path,
    mode: Mode,
    out: &mut dyn Write,
) -> Result<bool> {
    let written = match mode {
        Mode::DumpTokens => ast.dump_tokens(out),
        Mode::DumpAst => ast.dump(out),
        Mode::DumpStmt => {
            let stmt = ast.single_main_stmt().ok_or_else(|| MissingUnit::Statement {
                path: path.to_path_buf(),
            })?;
            stmt.dump(out)
        }
        Mode::DumpExpr => {
            let expr = ast.single_main_expr().ok_or_else(|| MissingUnit::Expression {
                path: path.to_path_buf(),
            })?;
            expr.dump(out)
        }
        _ => return Ok(false),
    };
    written.map_err(CompileError::Dump)?;
    Ok(true)
}

/// Dumps taken after semantic analysis.
///
/// `DumpReference` sees the tree after resolution only, since semantic
/// analysis stops early in that mode.
pub fn dump_semantic<A: Dump>(ast: &A, mode: Mode, out: &mut dyn Write) -> Result<bool> {
    match mode {
        Mode::DumpReference | Mode::DumpSemantic => {
            ast.dump(out).map_err(CompileError::Dump)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Dump of the intermediate code.
pub fn dump_ir<I: Dump>(ir: &I, mode: Mode, out: &mut dyn Write) -> Result<bool> {
    if mode != Mode::DumpIr {
        return Ok(false);
    }
    ir.dump(out).map_err(CompileError::Dump)?;
    Ok(true)
}

/// Dumps of the generated assembly, structured or as text.
pub fn dump_asm<A: AssemblyCode>(asm: &A, mode: Mode, out: &mut dyn Write) -> Result<bool> {
    let written = match mode {
        Mode::DumpAsm => asm.dump(out),
        Mode::PrintAsm => out.write_all(asm.to_source().as_bytes()),
        _ => return Ok(false),
    };
    written.map_err(CompileError::Dump)?;
    Ok(true)
}
