//! The orchestrator driving the real Cinder frontend and code generator.
//!
//! Tests that need the system assembler and C compiler are ignored by
//! default; run them with `cargo test -- --ignored`.

use std::{
    cell::RefCell,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
    rc::Rc,
};

use cinder_core::{CompileError, DiagnosticSink, Mode, Options, SourceKind};
use cinder_driver::{CcLinker, Compiler, GnuAssembler};
use cinder_lang::{CinderFrontend, X86_64CodeGenerator};

const PROGRAM: &str = "\
fn add(a: int, b: int) -> int {
    return a + b;
}

fn main() -> int {
    let total: int = 0;
    let i: int = 1;
    while (i <= 4) {
        total = add(total, i);
        i = i + 1;
    }
    return total;
}
";

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn write_source(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

fn compiler(out: &SharedBuffer) -> Compiler<CinderFrontend, X86_64CodeGenerator> {
    Compiler::new(
        CinderFrontend::new(),
        X86_64CodeGenerator::new(),
        GnuAssembler::new("as"),
        CcLinker::new("cc"),
    )
    .with_output(out.clone())
}

fn run(mode: Mode, inputs: &[PathBuf]) -> (Result<Vec<cinder_core::SourceFile>, CompileError>, String) {
    let options = Options::builder()
        .mode(mode)
        .inputs(inputs.iter().cloned())
        .build()
        .unwrap();
    let out = SharedBuffer::default();
    let mut sink = DiagnosticSink::silent("cinder");
    let result = compiler(&out).build(options.source_files().to_vec(), &options, &mut sink);
    (result, out.contents())
}

#[test]
fn test_compile_writes_assembly_next_to_source() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "sum.cn", PROGRAM);

    let (result, printed) = run(Mode::Compile, &[src]);
    let built = result.unwrap();

    assert_eq!(printed, "");
    assert_eq!(built[0].kind(), SourceKind::Assembly);
    let asm = fs::read_to_string(dir.path().join("sum.s")).unwrap();
    assert!(asm.contains("\nmain:\n"));
    assert!(asm.contains("\nadd:\n"));
    assert!(asm.contains("\tcall\tadd\n"));
}

#[test]
fn test_print_asm_matches_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "sum.cn", PROGRAM);

    let (result, printed) = run(Mode::PrintAsm, std::slice::from_ref(&src));
    result.unwrap();
    assert!(!dir.path().join("sum.s").exists());

    run(Mode::Compile, &[src]).0.unwrap();
    let written = fs::read_to_string(dir.path().join("sum.s")).unwrap();
    assert_eq!(printed, written);
}

#[test]
fn test_check_syntax_verdicts() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_source(dir.path(), "good.cn", PROGRAM);
    let bad = write_source(dir.path(), "bad.cn", "fn main( {}\n");
    let options = Options::builder()
        .mode(Mode::CheckSyntax)
        .inputs([good.clone(), bad.clone()])
        .build()
        .unwrap();

    let out = SharedBuffer::default();
    let mut sink = DiagnosticSink::silent("cinder");
    let ok = compiler(&out).check_syntax(options.source_files(), &options, &mut sink);

    assert!(!ok);
    assert_eq!(
        out.contents(),
        format!(
            "{}: Syntax OK\n{}: Syntax Error\n",
            good.display(),
            bad.display()
        )
    );
    let diagnostic = sink.errors().next().unwrap();
    assert_eq!(
        diagnostic.location.as_deref(),
        Some(format!("{}:1:10", bad.display()).as_str())
    );
}

#[test]
fn test_check_syntax_survives_deep_nesting() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_source(dir.path(), "first.cn", PROGRAM);
    let nested = format!(
        "fn main() -> int {{ return {}1{}; }}\n",
        "(".repeat(100_000),
        ")".repeat(100_000)
    );
    let deep = write_source(dir.path(), "deep.cn", &nested);
    let last = write_source(dir.path(), "last.cn", PROGRAM);
    let options = Options::builder()
        .mode(Mode::CheckSyntax)
        .inputs([first.clone(), deep.clone(), last.clone()])
        .build()
        .unwrap();

    let out = SharedBuffer::default();
    let mut sink = DiagnosticSink::silent("cinder");
    let ok = compiler(&out).check_syntax(options.source_files(), &options, &mut sink);

    assert!(!ok);
    assert_eq!(
        out.contents(),
        format!(
            "{}: Syntax OK\n{}: Syntax Error\n{}: Syntax OK\n",
            first.display(),
            deep.display(),
            last.display()
        )
    );
    assert_eq!(sink.errors().count(), 1);
    assert_eq!(
        sink.errors().next().unwrap().message,
        "expression nested too deeply"
    );
}

#[test]
fn test_dump_ir() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "one.cn", "fn main() -> int { return 1 + 2; }\n");

    let (result, printed) = run(Mode::DumpIr, &[src.clone()]);
    result.unwrap();
    assert_eq!(
        printed,
        format!(
            "ir {}\nfunction main (params 0, slots 0)\n  return (add 1 2)\n",
            src.display()
        )
    );
}

#[test]
fn test_dump_asm_is_json() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "one.cn", "fn main() { }\n");

    let (result, printed) = run(Mode::DumpAsm, &[src]);
    result.unwrap();
    let value: serde_json::Value = serde_json::from_str(&printed).unwrap();
    let lines = value["lines"].as_array().unwrap();
    assert!(lines.iter().any(|l| l["kind"] == "label" && l["name"] == "main"));
}

#[test]
fn test_dump_expr_requires_single_expression() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "two.cn", PROGRAM);

    let (result, printed) = run(Mode::DumpExpr, &[src]);
    let err = result.unwrap_err();
    assert!(err.to_string().ends_with("source file does not contain single expression"));
    assert_eq!(printed, "");
}

#[test]
fn test_dump_reference_shows_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "ref.cn",
        "fn main() -> int { let x: int = 3; return x; }\n",
    );

    let (result, printed) = run(Mode::DumpReference, &[src]);
    result.unwrap();
    assert!(printed.contains("name x -> local 0"));
    // Types are assigned later, so none are printed yet.
    assert!(!printed.contains(" : int"));
}

#[test]
fn test_semantic_error_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "bad.cn", "fn main() -> int { return true; }\n");

    let (result, _) = run(Mode::Compile, &[src]);
    let err = result.unwrap_err();
    assert!(matches!(err, CompileError::Semantic(_)));
    assert!(!dir.path().join("bad.s").exists());
}

#[test]
#[ignore = "needs a system assembler and C compiler"]
fn test_link_and_run_executable() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "sum.cn", PROGRAM);
    let exe = dir.path().join("sum");
    let options = Options::builder()
        .mode(Mode::Link)
        .input(&src)
        .output(exe.to_string_lossy())
        .build()
        .unwrap();

    let out = SharedBuffer::default();
    let mut sink = DiagnosticSink::silent("cinder");
    compiler(&out)
        .build(options.source_files().to_vec(), &options, &mut sink)
        .unwrap();

    let status = Command::new(&exe).status().unwrap();
    assert_eq!(status.code(), Some(10));
}
