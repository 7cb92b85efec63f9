use std::path::PathBuf;

use cinder_core::{DiagnosticSink, LinkerOptions, Mode, OptionError, Options, OptionsBuilder};
use cinder_driver::{CcLinker, Compiler, GnuAssembler};
use cinder_lang::{CinderFrontend, X86_64CodeGenerator};
use clap::{Args, Parser};
use eyre::Result;
use tracing::debug;

use crate::logging;

pub(crate) const PROGRAM: &str = "cinder";

/// Print the usage hint that follows every option error.
pub(crate) fn usage_hint() {
    eprintln!("Try \"{PROGRAM} --help\" for usage");
}

#[derive(Parser, Debug)]
#[command(name = "cinder")]
#[command(version)]
#[command(about = "Compile Cinder sources to assembly, objects, executables or shared libraries")]
pub(crate) struct Cli {
    #[command(flatten)]
    mode: ModeArgs,

    /// Place the output into FILE (`-` prints assembly, only with -S)
    #[arg(short = 'o', value_name = "FILE", allow_hyphen_values = true)]
    output: Option<String>,

    /// Pass comma-separated ARGS to the assembler (`a,ARGS`) or linker (`l,ARGS`)
    #[arg(short = 'W', value_name = "a|l,ARGS", allow_hyphen_values = true)]
    pass_through: Vec<String>,

    /// Add DIR to the library search path
    #[arg(short = 'L', value_name = "DIR")]
    library_dirs: Vec<String>,

    /// Link against LIB
    #[arg(short = 'l', value_name = "LIB")]
    libraries: Vec<String>,

    /// Code generation flag: pic, PIC, pie or PIE
    #[arg(short = 'f', value_name = "FLAG", value_parser = ["pic", "PIC", "pie", "PIE"])]
    codegen: Vec<String>,

    /// Produce a shared library
    #[arg(long)]
    shared: bool,

    /// Link statically
    #[arg(long = "static")]
    static_link: bool,

    /// Produce a position independent executable
    #[arg(long, overrides_with = "no_pie")]
    pie: bool,

    /// Do not produce a position independent executable
    #[arg(long, overrides_with = "pie")]
    no_pie: bool,

    /// Do not link the C runtime start files
    #[arg(long)]
    nostartfiles: bool,

    /// Do not link the default libraries
    #[arg(long)]
    nodefaultlibs: bool,

    /// Link neither start files nor default libraries
    #[arg(long)]
    nostdlib: bool,

    /// Assembler to run
    #[arg(long = "as", value_name = "PATH", env = "CINDER_AS", default_value = "as")]
    assembler: String,

    /// C compiler used as the linker driver
    #[arg(long = "cc", value_name = "PATH", env = "CINDER_CC", default_value = "cc")]
    linker: String,

    /// Increase log verbosity and echo external commands (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log level, overriding -v and -q
    #[arg(long, value_enum, value_name = "LEVEL")]
    log: Option<logging::LogLevel>,

    /// Source (.cn), assembly (.s) or object (.o) files
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,
}

/// The stage to stop at; linking when none is given.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
struct ModeArgs {
    /// Check syntax and print a verdict per file
    #[arg(long)]
    check_syntax: bool,

    /// Print the token stream
    #[arg(long)]
    dump_tokens: bool,

    /// Print the syntax tree
    #[arg(long)]
    dump_ast: bool,

    /// Print the only statement of main
    #[arg(long)]
    dump_stmt: bool,

    /// Print the only expression of main
    #[arg(long)]
    dump_expr: bool,

    /// Print the syntax tree after semantic analysis
    #[arg(long)]
    dump_semantic: bool,

    /// Print the syntax tree after name resolution
    #[arg(long)]
    dump_reference: bool,

    /// Print the intermediate code
    #[arg(long)]
    dump_ir: bool,

    /// Print the generated assembly as JSON
    #[arg(long)]
    dump_asm: bool,

    /// Print the generated assembly text
    #[arg(long)]
    print_asm: bool,

    /// Stop after writing assembly (.s)
    #[arg(short = 'S')]
    compile: bool,

    /// Stop after assembling (.o)
    #[arg(short = 'c')]
    assemble: bool,
}

impl ModeArgs {
    fn mode(&self) -> Mode {
        let flags = [
            (self.check_syntax, "--check-syntax"),
            (self.dump_tokens, "--dump-tokens"),
            (self.dump_ast, "--dump-ast"),
            (self.dump_stmt, "--dump-stmt"),
            (self.dump_expr, "--dump-expr"),
            (self.dump_semantic, "--dump-semantic"),
            (self.dump_reference, "--dump-reference"),
            (self.dump_ir, "--dump-ir"),
            (self.dump_asm, "--dump-asm"),
            (self.print_asm, "--print-asm"),
            (self.compile, "-S"),
            (self.assemble, "-c"),
        ];
        flags
            .into_iter()
            .find_map(|(set, option)| set.then(|| Mode::from_option(option)))
            .unwrap_or(Mode::Link)
    }
}

/// Append one `-W` argument to the builder.
fn pass_through(builder: OptionsBuilder, arg: &str) -> Result<OptionsBuilder, OptionError> {
    if let Some(args) = arg.strip_prefix("a,") {
        Ok(args
            .split(',')
            .filter(|a| !a.is_empty())
            .fold(builder, |b, a| b.assembler_arg(a)))
    } else if let Some(args) = arg.strip_prefix("l,") {
        Ok(args
            .split(',')
            .filter(|a| !a.is_empty())
            .fold(builder, |b, a| b.linker_arg(a)))
    } else {
        Err(OptionError::new(format!("unknown option: -W{arg}")))
    }
}

impl Cli {
    /// Convert the parsed command line into validated build options.
    pub(crate) fn options(&self) -> Result<Options, OptionError> {
        let pie = if self.pie {
            Some(true)
        } else if self.no_pie {
            Some(false)
        } else {
            None
        };
        let linker_options = LinkerOptions {
            shared: self.shared,
            static_link: self.static_link,
            pie,
            no_start_files: self.nostartfiles,
            no_default_libs: self.nodefaultlibs,
            no_stdlib: self.nostdlib,
        };

        let mut builder = Options::builder()
            .mode(self.mode.mode())
            .inputs(self.files.iter().cloned())
            .verbose(self.verbose > 0)
            .pic(!self.codegen.is_empty())
            .assembler(self.assembler.as_str())
            .linker(self.linker.as_str())
            .linker_options(linker_options);
        if let Some(output) = &self.output {
            builder = builder.output(output.as_str());
        }
        for arg in &self.pass_through {
            builder = pass_through(builder, arg)?;
        }
        for dir in &self.library_dirs {
            builder = builder.library_dir(dir.as_str());
        }
        for lib in &self.libraries {
            builder = builder.library(lib.as_str());
        }
        builder.build()
    }

    /// Run the invocation and return the process exit code.
    pub fn run(&self) -> Result<i32> {
        logging::setup(self.verbose, self.quiet, self.log)?;

        let options = match self.options() {
            Ok(options) => options,
            Err(err) => {
                eprintln!("{PROGRAM}: {err}");
                usage_hint();
                return Ok(1);
            }
        };
        debug!(mode = %options.mode(), files = options.source_files().len(), "options");

        let mut compiler = Compiler::new(
            CinderFrontend::new(),
            X86_64CodeGenerator::new(),
            GnuAssembler::from_options(&options),
            CcLinker::from_options(&options),
        );
        let mut sink = DiagnosticSink::new(PROGRAM);

        if options.mode() == Mode::CheckSyntax {
            let ok = compiler.check_syntax(options.source_files(), &options, &mut sink);
            return Ok(if ok { 0 } else { 1 });
        }

        match compiler.build(options.source_files().to_vec(), &options, &mut sink) {
            Ok(_) => Ok(0),
            Err(err) => {
                eprintln!("{:?}", miette::Report::new(err));
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cinder_core::Destination;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cinder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_mode_links() {
        let options = parse(&["main.cn"]).options().unwrap();
        assert_eq!(options.mode(), Mode::Link);
        assert_eq!(options.assembler(), "as");
        assert!(!options.is_pic());
    }

    #[test]
    fn test_mode_flags() {
        assert_eq!(parse(&["-S", "a.cn"]).mode.mode(), Mode::Compile);
        assert_eq!(parse(&["-c", "a.cn"]).mode.mode(), Mode::Assemble);
        assert_eq!(parse(&["--dump-ir", "a.cn"]).mode.mode(), Mode::DumpIr);
        assert_eq!(
            parse(&["--check-syntax", "a.cn"]).mode.mode(),
            Mode::CheckSyntax
        );
    }

    #[test]
    fn test_mode_flags_are_exclusive() {
        let err = Cli::try_parse_from(["cinder", "-S", "-c", "a.cn"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_files_are_required() {
        let err = Cli::try_parse_from(["cinder", "-S"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_pass_through_arguments() {
        let options = parse(&[
            "-Wa,--32,-g",
            "-Wl,-rpath,/opt/lib",
            "-L",
            "/opt/lib",
            "-lm",
            "a.cn",
        ])
        .options()
        .unwrap();
        assert_eq!(options.as_args(), ["--32", "-g"]);
        assert_eq!(
            options.ld_args(),
            ["-L/opt/lib", "-lm", "-rpath", "/opt/lib"]
        );
    }

    #[test]
    fn test_unknown_pass_through() {
        let err = parse(&["-Wx,foo", "a.cn"]).options().unwrap_err();
        assert_eq!(err.to_string(), "unknown option: -Wx,foo");
    }

    #[test]
    fn test_pic_and_linker_flags() {
        let options = parse(&["-fPIC", "--shared", "--nostdlib", "lib.cn"])
            .options()
            .unwrap();
        assert!(options.is_pic());
        assert!(options.is_generating_shared_library());
        assert!(options.linker_options().no_stdlib);
        assert_eq!(options.so_file_name(), PathBuf::from("lib.so"));
    }

    #[test]
    fn test_last_pie_flag_wins() {
        let options = parse(&["--pie", "--no-pie", "a.cn"]).options().unwrap();
        assert_eq!(options.linker_options().pie, Some(false));
    }

    #[test]
    fn test_stdout_output_only_with_compile() {
        let options = parse(&["-S", "-o", "-", "a.cn"]).options().unwrap();
        assert_eq!(
            options.asm_file_name_of(&options.source_files()[0]),
            Destination::Stdout
        );

        let err = parse(&["-c", "-o", "-", "a.cn"]).options().unwrap_err();
        assert_eq!(err.to_string(), "-o - is only allowed with -S");
    }

    #[test]
    fn test_output_with_several_inputs() {
        let err = parse(&["-S", "-o", "x.s", "a.cn", "b.cn"])
            .options()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "-o option requires only 1 input (except linking)"
        );
        assert!(parse(&["-o", "app", "a.cn", "b.cn"]).options().is_ok());
    }
}
