use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// A malformed command line. Never reaches the pipeline.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(cinder::option), help("Try \"cinder --help\" for usage"))]
pub struct OptionError {
    pub message: String,
}

impl OptionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A source file does not parse.
#[derive(Debug, Error, Diagnostic)]
#[error("{}:{}:{}: {}", .path.display(), .line, .column, .message)]
#[diagnostic(code(cinder::syntax))]
pub struct SyntaxError {
    pub path: PathBuf,
    pub message: String,
    pub line: usize,
    pub column: usize,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("{message}")]
    pub span: SourceSpan,
}

impl SyntaxError {
    /// Build an error for the `len` bytes at `offset` in `source`.
    ///
    /// Line and column are 1-based and derived from the offset.
    pub fn new(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let source = source.into();
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        let message = message.into();
        Self {
            src: NamedSource::new(path.display().to_string(), source),
            path,
            message,
            line,
            column,
            span: (offset, len).into(),
        }
    }

    /// Location prefix in `path:line:column` form.
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// Name, type or dereference errors were found.
///
/// The individual errors were already reported to the diagnostic sink by
/// the stage that found them.
#[derive(Debug, Error, Diagnostic)]
#[error("compile failed: {count} error{} in {stage}", plural(.count))]
#[diagnostic(code(cinder::semantic))]
pub struct SemanticError {
    pub stage: String,
    pub count: usize,
}

impl SemanticError {
    pub fn new(stage: impl Into<String>, count: usize) -> Self {
        Self {
            stage: stage.into(),
            count,
        }
    }
}

/// Reading or writing a file failed.
#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("no such file: {}", .path.display())]
    #[diagnostic(code(cinder::file_not_found))]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{}'", .path.display())]
    #[diagnostic(code(cinder::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cause was reported to the sink where it was detected.
    #[error("file error: could not write '{}'", .path.display())]
    #[diagnostic(code(cinder::write))]
    Write { path: PathBuf },
}

impl FileError {
    /// Classify an error raised while reading `path`.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound { path, source }
        } else {
            FileError::Read { path, source }
        }
    }
}

/// An external assembler or linker could not be run or failed.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("external command error: failed to run '{program}'")]
    #[diagnostic(code(cinder::tool_spawn), help("check that '{program}' is installed and on PATH"))]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed. ({})", status_text(.code))]
    #[diagnostic(code(cinder::tool_failed))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

fn status_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// A dump of a single `main` statement or expression found nothing to print.
#[derive(Debug, Error, Diagnostic)]
pub enum MissingUnit {
    #[error("{}: source file does not contain main()", .path.display())]
    #[diagnostic(
        code(cinder::missing_main),
        help("--dump-stmt needs a main() whose body is exactly one statement")
    )]
    Statement { path: PathBuf },

    #[error("{}: source file does not contain single expression", .path.display())]
    #[diagnostic(
        code(cinder::missing_expr),
        help("--dump-expr needs a main() whose body is exactly one expression")
    )]
    Expression { path: PathBuf },
}

/// Any failure that aborts a build.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingUnit(#[from] MissingUnit),

    /// Writing a dump to the output stream failed.
    #[error("failed to write dump output")]
    #[diagnostic(code(cinder::dump))]
    Dump(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_error_pluralizes() {
        assert_eq!(
            SemanticError::new("type checking", 1).to_string(),
            "compile failed: 1 error in type checking"
        );
        assert_eq!(
            SemanticError::new("name resolution", 3).to_string(),
            "compile failed: 3 errors in name resolution"
        );
    }

    #[test]
    fn test_tool_failure_message() {
        let err = ToolError::Failed {
            program: "as".into(),
            code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "as failed. (status 1)");

        let err = ToolError::Failed {
            program: "cc".into(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "cc failed. (terminated by signal)");
    }

    #[test]
    fn test_file_error_classifies_not_found() {
        let err = FileError::read(
            "missing.cn",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, FileError::NotFound { .. }));
        assert_eq!(err.to_string(), "no such file: missing.cn");

        let err = FileError::read(
            "locked.cn",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, FileError::Read { .. }));
    }

    #[test]
    fn test_compile_error_classification() {
        let err: CompileError = MissingUnit::Statement {
            path: "main.cn".into(),
        }
        .into();
        assert!(matches!(err, CompileError::MissingUnit(_)));
        assert_eq!(
            err.to_string(),
            "main.cn: source file does not contain main()"
        );
    }

    #[test]
    fn test_syntax_error_location() {
        let err = SyntaxError::new(
            "main.cn",
            "fn main() {\n    return 1\n}\n",
            24,
            1,
            "expected ';'",
        );
        assert_eq!(err.location(), "main.cn:2:13");
        assert_eq!(err.to_string(), "main.cn:2:13: expected ';'");
        let err: CompileError = err.into();
        assert!(matches!(err, CompileError::Syntax(_)));
    }
}
