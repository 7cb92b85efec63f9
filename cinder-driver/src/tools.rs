//! External assembler and linker invocation.
//!
//! Tools run as blocking child processes. The orchestrator waits for each
//! one to exit and inspects its [`ToolOutput`]; there is no timeout or
//! retry.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use cinder_core::{Assembler, DiagnosticSink, Linker, LinkerOptions, Options, ToolError};
use tracing::debug;

/// Captured result of one external command.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Render a command line for logs and verbose output.
pub fn command_line(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run `program` with `args` and wait for it to finish.
///
/// The command line is echoed to the sink when `verbose` is set. Anything
/// the tool printed on stderr is forwarded to the sink, as errors when the
/// tool failed and as warnings otherwise.
///
/// # Errors
///
/// Returns [`ToolError::Spawn`] when the program cannot be started and
/// [`ToolError::Failed`] when it exits unsuccessfully.
pub fn invoke(
    stage: &str,
    program: &str,
    args: &[OsString],
    verbose: bool,
    sink: &mut DiagnosticSink,
) -> Result<ToolOutput, ToolError> {
    let line = command_line(program, args);
    debug!(stage, command = %line, "invoking external tool");
    if verbose {
        sink.info(stage, line);
    }

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    for msg in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
        if output.success() {
            sink.warning(stage, msg);
        } else {
            sink.error(stage, msg);
        }
    }

    if output.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: output.stderr,
        })
    }
}

/// GNU `as`.
#[derive(Debug, Clone)]
pub struct GnuAssembler {
    program: String,
    verbose: bool,
}

impl GnuAssembler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            verbose: false,
        }
    }

    /// Configure from the build options.
    pub fn from_options(options: &Options) -> Self {
        Self::new(options.assembler()).verbose(options.is_verbose())
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn command(src: &Path, dest: &Path, args: &[String]) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = args.iter().map(OsString::from).collect();
        cmd.push("-o".into());
        cmd.push(dest.into());
        cmd.push(src.into());
        cmd
    }
}

impl Assembler for GnuAssembler {
    fn assemble(
        &self,
        src: &Path,
        dest: &Path,
        args: &[String],
        sink: &mut DiagnosticSink,
    ) -> Result<(), ToolError> {
        let cmd = Self::command(src, dest, args);
        invoke("assemble", &self.program, &cmd, self.verbose, sink).map(|_| ())
    }
}

/// Links through the system C compiler driver, which knows where the C
/// runtime start files and default libraries live.
#[derive(Debug, Clone)]
pub struct CcLinker {
    program: String,
    verbose: bool,
}

impl CcLinker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            verbose: false,
        }
    }

    /// Configure from the build options.
    pub fn from_options(options: &Options) -> Self {
        Self::new(options.linker()).verbose(options.is_verbose())
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn common_flags(options: &LinkerOptions, cmd: &mut Vec<OsString>) {
        if options.static_link {
            cmd.push("-static".into());
        }
        if options.no_stdlib {
            cmd.push("-nostdlib".into());
        } else {
            if options.no_start_files {
                cmd.push("-nostartfiles".into());
            }
            if options.no_default_libs {
                cmd.push("-nodefaultlibs".into());
            }
        }
    }

    fn executable_command(
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
    ) -> Vec<OsString> {
        let mut cmd = Vec::new();
        match options.pie {
            Some(true) => cmd.push("-pie".into()),
            Some(false) => cmd.push("-no-pie".into()),
            None => {}
        }
        Self::common_flags(options, &mut cmd);
        Self::finish(inputs, args, dest, cmd)
    }

    fn shared_library_command(
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
    ) -> Vec<OsString> {
        let mut cmd = vec![OsString::from("-shared")];
        Self::common_flags(options, &mut cmd);
        Self::finish(inputs, args, dest, cmd)
    }

    fn finish(
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        mut cmd: Vec<OsString>,
    ) -> Vec<OsString> {
        cmd.extend(inputs.iter().map(OsString::from));
        cmd.extend(args.iter().map(OsString::from));
        cmd.push("-o".into());
        cmd.push(dest.into());
        cmd
    }
}

impl Linker for CcLinker {
    fn generate_executable(
        &self,
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
        sink: &mut DiagnosticSink,
    ) -> Result<(), ToolError> {
        let cmd = Self::executable_command(inputs, args, dest, options);
        invoke("link", &self.program, &cmd, self.verbose, sink).map(|_| ())
    }

    fn generate_shared_library(
        &self,
        inputs: &[PathBuf],
        args: &[String],
        dest: &Path,
        options: &LinkerOptions,
        sink: &mut DiagnosticSink,
    ) -> Result<(), ToolError> {
        let cmd = Self::shared_library_command(inputs, args, dest, options);
        invoke("link", &self.program, &cmd, self.verbose, sink).map(|_| ())
    }
}
