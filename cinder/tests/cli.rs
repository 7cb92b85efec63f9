//! End-to-end tests of the `cinder` binary.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

const MAIN: &str = "fn main() -> int {\n    return 6 * 7;\n}\n";

fn cinder(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cinder"))
        .current_dir(dir)
        .args(args)
        .env_remove("CINDER_AS")
        .env_remove("CINDER_CC")
        .output()
        .unwrap()
}

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_and_version_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    let help = cinder(dir.path(), &["--help"]);
    assert!(help.status.success());
    assert!(stdout(&help).contains("--check-syntax"));

    let version = cinder(dir.path(), &["--version"]);
    assert!(version.status.success());
    assert!(stdout(&version).starts_with("cinder "));
}

#[test]
fn test_malformed_options_print_usage_hint() {
    let dir = tempfile::tempdir().unwrap();
    let output = cinder(dir.path(), &["--no-such-flag", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Try \"cinder --help\" for usage"));

    let output = cinder(dir.path(), &["-S", "-c", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_option_errors_print_usage_hint() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", MAIN);

    let output = cinder(dir.path(), &["-c", "-o", "-", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("cinder: -o - is only allowed with -S"));
    assert!(err.contains("Try \"cinder --help\" for usage"));

    let output = cinder(dir.path(), &["notes.txt"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown file type: notes.txt"));
}

#[test]
fn test_check_syntax() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.cn", MAIN);
    write(dir.path(), "bad.cn", "fn main() -> int { return 1 }\n");

    let output = cinder(dir.path(), &["--check-syntax", "good.cn"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "good.cn: Syntax OK\n");

    let output = cinder(dir.path(), &["--check-syntax", "bad.cn", "good.cn"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "bad.cn: Syntax Error\ngood.cn: Syntax OK\n");
    assert!(stderr(&output).contains("bad.cn:1:29"));
}

#[test]
fn test_check_syntax_deeply_nested_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.cn", MAIN);
    let negations = "-".repeat(200_000);
    write(
        dir.path(),
        "deep.cn",
        &format!("fn main() -> int {{ return {negations}1; }}\n"),
    );

    let output = cinder(dir.path(), &["--check-syntax", "deep.cn", "good.cn"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "deep.cn: Syntax Error\ngood.cn: Syntax OK\n");
    assert!(stderr(&output).contains("expression nested too deeply"));
}

#[test]
fn test_compile_to_assembly_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", MAIN);

    let output = cinder(dir.path(), &["-S", "main.cn"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "");

    let asm = fs::read_to_string(dir.path().join("main.s")).unwrap();
    assert!(asm.contains("\t.globl main\n"));
    assert!(asm.contains("\tmovq\t$7, %rax\n"));
}

#[test]
fn test_compile_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", MAIN);

    let output = cinder(dir.path(), &["-S", "-o", "-", "main.cn"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("main:\n"));
    assert!(!dir.path().join("main.s").exists());
}

#[test]
fn test_dump_tokens() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", "fn main() {}\n");

    let output = cinder(dir.path(), &["--dump-tokens", "main.cn"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "1:1\tkeyword\tfn\n1:4\tidentifier\tmain\n1:8\tpunct\t(\n1:9\tpunct\t)\n1:11\tpunct\t{\n1:12\tpunct\t}\n"
    );
}

#[test]
fn test_semantic_error_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", "fn main() -> int { return x; }\n");

    let output = cinder(dir.path(), &["-S", "main.cn"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("undefined name 'x'"));
    assert!(err.contains("compile failed: 1 error in name resolution"));
    assert!(!dir.path().join("main.s").exists());
}

#[test]
fn test_missing_assembler_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", MAIN);

    let output = cinder(
        dir.path(),
        &["-c", "--as", "/nonexistent/cinder-as", "main.cn"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to run '/nonexistent/cinder-as'"));
    // Assembly is written before the assembler runs.
    assert!(dir.path().join("main.s").exists());
    assert!(!dir.path().join("main.o").exists());
}

#[test]
#[ignore = "needs a system assembler and C compiler"]
fn test_build_and_run_executable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.cn", MAIN);

    let output = cinder(dir.path(), &["-o", "answer", "main.cn"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("main.s").exists());
    assert!(dir.path().join("main.o").exists());

    let status = Command::new(dir.path().join("answer")).status().unwrap();
    assert_eq!(status.code(), Some(42));
}
