//! Build configuration for one compiler invocation.
//!
//! [`Options`] is assembled from the command line through
//! [`OptionsBuilder`], validated once, and then only read: every file of the
//! build sees the same configuration.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    Mode, OptionError, SourceFile, SourceKind, TypeTable,
    source::{EXT_ASSEMBLY, EXT_OBJECT, EXT_SOURCE},
};

/// Destination sentinel meaning "standard output".
pub const STDOUT_SENTINEL: &str = "-";

/// Default output name when no other name can be derived.
pub const DEFAULT_OUTPUT: &str = "a.out";

/// Where a stage writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The output stream, selected with `-o -`.
    Stdout,
    /// A file on disk.
    Path(PathBuf),
}

impl Destination {
    /// Interpret a destination name, honoring the `-` sentinel.
    pub fn parse(name: &str) -> Self {
        if name == STDOUT_SENTINEL {
            Destination::Stdout
        } else {
            Destination::Path(PathBuf::from(name))
        }
    }

    /// The file path, unless this is standard output.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Destination::Stdout => None,
            Destination::Path(path) => Some(path),
        }
    }
}

impl From<PathBuf> for Destination {
    fn from(path: PathBuf) -> Self {
        Destination::Path(path)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str(STDOUT_SENTINEL),
            Destination::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Flags that shape the final link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkerOptions {
    /// Produce a shared library instead of an executable.
    pub shared: bool,
    /// Link statically.
    pub static_link: bool,
    /// Force (`Some(true)`) or suppress (`Some(false)`) a position
    /// independent executable; `None` keeps the linker default.
    pub pie: Option<bool>,
    /// Do not link the C runtime start files.
    pub no_start_files: bool,
    /// Do not link the default libraries.
    pub no_default_libs: bool,
    /// Neither start files nor default libraries.
    pub no_stdlib: bool,
}

/// Validated configuration of one invocation.
#[derive(Debug, Clone)]
pub struct Options {
    mode: Mode,
    sources: Vec<SourceFile>,
    output: Option<String>,
    types: TypeTable,
    verbose: bool,
    pic: bool,
    assembler: String,
    linker: String,
    as_args: Vec<String>,
    ld_args: Vec<String>,
    linker_options: LinkerOptions,
}

impl Options {
    /// Start building options.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// The active mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Input files in command-line order.
    pub fn source_files(&self) -> &[SourceFile] {
        &self.sources
    }

    /// The shared target type table.
    pub fn type_table(&self) -> &TypeTable {
        &self.types
    }

    /// Whether external commands are echoed.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether position independent code was requested.
    pub fn is_pic(&self) -> bool {
        self.pic
    }

    /// Whether the build continues past assembly text.
    pub fn is_assemble_required(&self) -> bool {
        self.mode.requires(Mode::Assemble)
    }

    /// Whether the build ends with a link.
    pub fn is_link_required(&self) -> bool {
        self.mode.requires(Mode::Link)
    }

    /// Whether the link produces a shared library.
    pub fn is_generating_shared_library(&self) -> bool {
        self.linker_options.shared
    }

    /// Assembly destination for `src`.
    pub fn asm_file_name_of(&self, src: &SourceFile) -> Destination {
        match (&self.output, self.mode) {
            (Some(output), Mode::Compile) => Destination::parse(output),
            _ => Destination::Path(src.asm_file_name()),
        }
    }

    /// Object destination for `src`.
    pub fn obj_file_name_of(&self, src: &SourceFile) -> PathBuf {
        match (&self.output, self.mode) {
            (Some(output), Mode::Assemble) => PathBuf::from(output),
            _ => src.obj_file_name(),
        }
    }

    /// Destination of the linked executable.
    pub fn exe_file_name(&self) -> PathBuf {
        self.linked_file_name("")
    }

    /// Destination of the linked shared library.
    pub fn so_file_name(&self) -> PathBuf {
        self.linked_file_name("so")
    }

    fn linked_file_name(&self, ext: &str) -> PathBuf {
        if let Some(output) = &self.output {
            return PathBuf::from(output);
        }
        match self.sources.as_slice() {
            [single] => single.with_extension(ext),
            _ => PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    /// Program used to assemble.
    pub fn assembler(&self) -> &str {
        &self.assembler
    }

    /// Program used to link.
    pub fn linker(&self) -> &str {
        &self.linker
    }

    /// Extra assembler arguments.
    pub fn as_args(&self) -> &[String] {
        &self.as_args
    }

    /// Extra linker arguments (library paths, libraries, pass-through flags).
    pub fn ld_args(&self) -> &[String] {
        &self.ld_args
    }

    /// Flags that shape the final link.
    pub fn linker_options(&self) -> &LinkerOptions {
        &self.linker_options
    }
}

/// Builder for [`Options`].
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    mode: Mode,
    inputs: Vec<PathBuf>,
    output: Option<String>,
    types: TypeTable,
    verbose: bool,
    pic: bool,
    assembler: String,
    linker: String,
    as_args: Vec<String>,
    library_dirs: Vec<String>,
    libraries: Vec<String>,
    ld_args: Vec<String>,
    linker_options: LinkerOptions,
}

impl OptionsBuilder {
    /// Defaults: full build, GNU `as`, `cc` as link driver, LP64 types.
    pub fn new() -> Self {
        Self {
            mode: Mode::default(),
            inputs: Vec::new(),
            output: None,
            types: TypeTable::lp64(),
            verbose: false,
            pic: false,
            assembler: "as".to_string(),
            linker: "cc".to_string(),
            as_args: Vec::new(),
            library_dirs: Vec::new(),
            libraries: Vec::new(),
            ld_args: Vec::new(),
            linker_options: LinkerOptions::default(),
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn type_table(mut self, types: TypeTable) -> Self {
        self.types = types;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn pic(mut self, pic: bool) -> Self {
        self.pic = pic;
        self
    }

    pub fn assembler(mut self, program: impl Into<String>) -> Self {
        self.assembler = program.into();
        self
    }

    pub fn linker(mut self, program: impl Into<String>) -> Self {
        self.linker = program.into();
        self
    }

    pub fn assembler_arg(mut self, arg: impl Into<String>) -> Self {
        self.as_args.push(arg.into());
        self
    }

    pub fn linker_arg(mut self, arg: impl Into<String>) -> Self {
        self.ld_args.push(arg.into());
        self
    }

    pub fn library_dir(mut self, dir: impl Into<String>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    pub fn library(mut self, name: impl Into<String>) -> Self {
        self.libraries.push(name.into());
        self
    }

    pub fn linker_options(mut self, options: LinkerOptions) -> Self {
        self.linker_options = options;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] when no input is given, an input has an
    /// unknown extension, or `-o` is combined with inputs or modes it
    /// cannot apply to.
    pub fn build(self) -> Result<Options, OptionError> {
        if self.inputs.is_empty() {
            return Err(OptionError::new("no input file"));
        }

        let mut sources = Vec::with_capacity(self.inputs.len());
        for path in self.inputs {
            let kind = SourceKind::from_path(&path).ok_or_else(|| {
                OptionError::new(format!(
                    "unknown file type: {} (expected .{}, .{} or .{})",
                    path.display(),
                    EXT_SOURCE,
                    EXT_ASSEMBLY,
                    EXT_OBJECT
                ))
            })?;
            sources.push(SourceFile::new(path, kind));
        }

        if let Some(output) = &self.output {
            if output == STDOUT_SENTINEL && self.mode != Mode::Compile {
                return Err(OptionError::new("-o - is only allowed with -S"));
            }
            if sources.len() > 1 && matches!(self.mode, Mode::Compile | Mode::Assemble) {
                return Err(OptionError::new(
                    "-o option requires only 1 input (except linking)",
                ));
            }
        }

        if self.linker_options.shared && self.linker_options.pie == Some(true) {
            return Err(OptionError::new("--shared cannot be combined with --pie"));
        }

        let mut ld_args = Vec::new();
        ld_args.extend(self.library_dirs.into_iter().map(|dir| format!("-L{dir}")));
        ld_args.extend(self.libraries.into_iter().map(|lib| format!("-l{lib}")));
        ld_args.extend(self.ld_args);

        Ok(Options {
            mode: self.mode,
            sources,
            output: self.output,
            types: self.types,
            verbose: self.verbose,
            pic: self.pic,
            assembler: self.assembler,
            linker: self.linker,
            as_args: self.as_args,
            ld_args,
            linker_options: self.linker_options,
        })
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_input() {
        let err = Options::builder().build().unwrap_err();
        assert_eq!(err.message, "no input file");
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = Options::builder().input("notes.txt").build().unwrap_err();
        assert!(err.message.starts_with("unknown file type: notes.txt"));
    }

    #[test]
    fn test_classifies_inputs() {
        let opts = Options::builder()
            .inputs(["main.cn", "start.s", "util.o"])
            .build()
            .unwrap();
        let kinds: Vec<SourceKind> = opts.source_files().iter().map(|f| f.kind()).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Source, SourceKind::Assembly, SourceKind::Object]
        );
    }

    #[test]
    fn test_depth_flags_follow_mode() {
        let link = Options::builder().input("a.cn").build().unwrap();
        assert!(link.is_assemble_required());
        assert!(link.is_link_required());

        let asm = Options::builder().mode(Mode::Assemble).input("a.cn").build().unwrap();
        assert!(asm.is_assemble_required());
        assert!(!asm.is_link_required());

        let dump = Options::builder().mode(Mode::DumpIr).input("a.cn").build().unwrap();
        assert!(!dump.is_assemble_required());
        assert!(!dump.is_link_required());
    }

    #[test]
    fn test_output_name_applies_to_terminal_stage_only() {
        let opts = Options::builder()
            .mode(Mode::Compile)
            .input("src/main.cn")
            .output("out.s")
            .build()
            .unwrap();
        let src = &opts.source_files()[0];
        assert_eq!(
            opts.asm_file_name_of(src),
            Destination::Path(PathBuf::from("out.s"))
        );
        assert_eq!(opts.obj_file_name_of(src), PathBuf::from("src/main.o"));

        let opts = Options::builder()
            .input("src/main.cn")
            .output("prog")
            .build()
            .unwrap();
        let src = &opts.source_files()[0];
        assert_eq!(
            opts.asm_file_name_of(src),
            Destination::Path(PathBuf::from("src/main.s"))
        );
        assert_eq!(opts.exe_file_name(), PathBuf::from("prog"));
    }

    #[test]
    fn test_stdout_sentinel() {
        let opts = Options::builder()
            .mode(Mode::Compile)
            .input("main.cn")
            .output("-")
            .build()
            .unwrap();
        assert_eq!(
            opts.asm_file_name_of(&opts.source_files()[0]),
            Destination::Stdout
        );

        let err = Options::builder()
            .input("main.cn")
            .output("-")
            .build()
            .unwrap_err();
        assert_eq!(err.message, "-o - is only allowed with -S");
    }

    #[test]
    fn test_single_output_for_multiple_inputs() {
        let err = Options::builder()
            .mode(Mode::Assemble)
            .inputs(["a.cn", "b.cn"])
            .output("x.o")
            .build()
            .unwrap_err();
        assert_eq!(
            err.message,
            "-o option requires only 1 input (except linking)"
        );

        assert!(
            Options::builder()
                .inputs(["a.cn", "b.cn"])
                .output("prog")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_linked_names() {
        let single = Options::builder().input("dir/hello.cn").build().unwrap();
        assert_eq!(single.exe_file_name(), PathBuf::from("dir/hello"));
        assert_eq!(single.so_file_name(), PathBuf::from("dir/hello.so"));

        let many = Options::builder().inputs(["a.cn", "b.o"]).build().unwrap();
        assert_eq!(many.exe_file_name(), PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn test_ld_args_order() {
        let opts = Options::builder()
            .input("a.cn")
            .library("m")
            .library_dir("/opt/lib")
            .linker_arg("--gc-sections")
            .build()
            .unwrap();
        assert_eq!(opts.ld_args(), ["-L/opt/lib", "-lm", "--gc-sections"]);
    }

    #[test]
    fn test_shared_excludes_pie() {
        let err = Options::builder()
            .input("a.cn")
            .linker_options(LinkerOptions {
                shared: true,
                pie: Some(true),
                ..LinkerOptions::default()
            })
            .build()
            .unwrap_err();
        assert!(err.message.contains("--shared"));
    }
}
