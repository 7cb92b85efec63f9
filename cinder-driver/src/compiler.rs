//! Pipeline orchestrator.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use cinder_core::{
    Artifact, Assembler, AssemblyCode, CodeGenerator, CompileError, Destination, DiagnosticSink,
    Frontend, Linker, Mode, Options, Result, SourceFile, SourceKind, TypeTable,
};
use tracing::{debug, info, info_span};

use crate::{Stage, dump, output};

/// What `compile()` left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiled {
    /// A dump mode printed a representation; nothing was written.
    Dumped,
    /// Assembly was written to the destination.
    Written(Destination),
}

/// The compilation pipeline orchestrator.
///
/// Drives each input through parse, semantic analysis, IR generation and
/// code generation, then optionally through the external assembler and
/// linker. The frontend and code generator are fixed at construction; the
/// assembler and linker are boxed so tests can substitute them.
///
/// # Example
///
/// ```ignore
/// let mut compiler = Compiler::new(
///     CinderFrontend::new(),
///     X86_64CodeGenerator::new(),
///     GnuAssembler::from_options(&options),
///     CcLinker::from_options(&options),
/// );
/// let mut sink = DiagnosticSink::new("cinder");
/// compiler.build(options.source_files().to_vec(), &options, &mut sink)?;
/// ```
pub struct Compiler<F, G> {
    frontend: F,
    codegen: G,
    assembler: Box<dyn Assembler>,
    linker: Box<dyn Linker>,
    out: Box<dyn Write>,
}

impl<F, G> Compiler<F, G>
where
    F: Frontend,
    G: CodeGenerator<F::Ir>,
{
    /// Create a compiler that prints dumps to stdout.
    pub fn new(
        frontend: F,
        codegen: G,
        assembler: impl Assembler + 'static,
        linker: impl Linker + 'static,
    ) -> Self {
        Self {
            frontend,
            codegen,
            assembler: Box::new(assembler),
            linker: Box::new(linker),
            out: Box::new(io::stdout()),
        }
    }

    /// Send dumps, syntax verdicts and `-o -` output to `out` instead.
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Parse every file and print a verdict line for each.
    ///
    /// Unlike [`Compiler::build`] this never stops early: every file gets
    /// its line. Returns true iff every file parsed.
    pub fn check_syntax(
        &mut self,
        files: &[SourceFile],
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> bool {
        let mut failed = false;
        for file in files {
            let ok = self.is_valid_syntax(file.path(), options, sink);
            let verdict = if ok { "Syntax OK" } else { "Syntax Error" };
            if writeln!(self.out, "{}: {}", file.path().display(), verdict).is_err() {
                sink.error(Stage::Parse.name(), "failed to write syntax verdict");
                failed = true;
            }
            failed |= !ok;
        }
        if self.out.flush().is_err() {
            sink.error(Stage::Parse.name(), "failed to flush syntax verdicts");
            failed = true;
        }
        !failed
    }

    fn is_valid_syntax(&self, path: &Path, options: &Options, sink: &mut DiagnosticSink) -> bool {
        match self.parse_file(path, options, sink) {
            Ok(_) => true,
            Err(CompileError::Syntax(err)) => {
                sink.error_at(Stage::Parse.name(), err.location(), err.message.clone());
                false
            }
            Err(err) => {
                sink.error(Stage::Parse.name(), err.to_string());
                false
            }
        }
    }

    /// Build every file in order, then link once if required.
    ///
    /// The first failure aborts the whole build: later files are not
    /// processed and the link never runs. Artifacts already written for
    /// earlier files stay on disk. Returns the final state of each file.
    pub fn build(
        &mut self,
        files: Vec<SourceFile>,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<Vec<SourceFile>> {
        let mut built = Vec::with_capacity(files.len());

        for mut file in files {
            let span = info_span!("file", path = %file.original_path().display());
            let _guard = span.enter();

            if file.is_source() {
                let dest = options.asm_file_name_of(&file);
                if let Compiled::Written(Destination::Path(path)) =
                    self.compile(file.path(), &dest, options, sink)?
                {
                    file = file.advance(Artifact::new(path, SourceKind::Assembly));
                }
            }

            if !options.is_assemble_required() {
                built.push(file);
                continue;
            }

            if file.is_assembly() {
                let dest = options.obj_file_name_of(&file);
                self.assemble(file.path(), &dest, options, sink)?;
                file = file.advance(Artifact::new(dest, SourceKind::Object));
            }

            built.push(file);
        }

        if options.is_link_required() {
            let inputs: Vec<PathBuf> = built.iter().map(|f| f.path().to_path_buf()).collect();
            self.link(&inputs, options, sink)?;
        }

        Ok(built)
    }

    /// Compile one source file to assembly.
    ///
    /// After each stage the active mode may ask for that stage's
    /// representation; if so it is printed and nothing further runs for
    /// this file. Otherwise the assembly text is written to `dest`.
    pub fn compile(
        &mut self,
        src: &Path,
        dest: &Destination,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<Compiled> {
        let mode = options.mode();
        let types = options.type_table();

        let ast = self.parse_file(src, options, sink)?;
        if dump::dump_parsed(&ast, src, mode, self.out.as_mut())? {
            return Ok(Compiled::Dumped);
        }

        let ast = self.semantic_analyze(ast, types, options, sink)?;
        if dump::dump_semantic(&ast, mode, self.out.as_mut())? {
            return Ok(Compiled::Dumped);
        }

        stage(Stage::GenerateIr);
        let ir = self.frontend.generate_ir(ast, types, sink)?;
        if dump::dump_ir(&ir, mode, self.out.as_mut())? {
            return Ok(Compiled::Dumped);
        }

        let asm = self.generate_assembly(&ir, options, sink)?;
        if dump::dump_asm(&asm, mode, self.out.as_mut())? {
            return Ok(Compiled::Dumped);
        }

        stage(Stage::Write);
        output::write_file(dest, &asm.to_source(), self.out.as_mut(), sink)?;
        info!(dest = %dest, "wrote assembly");
        Ok(Compiled::Written(dest.clone()))
    }

    /// Parse one file.
    pub fn parse_file(
        &self,
        path: &Path,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<F::Ast> {
        stage(Stage::Parse);
        self.frontend.parse_file(path, options, sink)
    }

    /// Resolve names and types, then check the tree.
    ///
    /// Resolution and the type-table check always run first because the
    /// later checks query resolved types. In `DumpReference` mode the
    /// dereference and type checks are skipped.
    pub fn semantic_analyze(
        &self,
        mut ast: F::Ast,
        types: &TypeTable,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<F::Ast> {
        stage(Stage::ResolveLocals);
        self.frontend.resolve_locals(&mut ast, sink)?;
        stage(Stage::ResolveTypes);
        self.frontend.resolve_types(&mut ast, types, sink)?;
        stage(Stage::CheckTypeTable);
        self.frontend.check_type_table(&ast, types, sink)?;
        if options.mode() == Mode::DumpReference {
            return Ok(ast);
        }
        stage(Stage::CheckDereferences);
        self.frontend.check_dereferences(&ast, types, sink)?;
        stage(Stage::CheckTypes);
        self.frontend.check_types(&mut ast, types, sink)?;
        Ok(ast)
    }

    /// Generate target assembly from intermediate code.
    pub fn generate_assembly(
        &self,
        ir: &F::Ir,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<G::Asm> {
        stage(Stage::GenerateAssembly);
        self.codegen.generate(ir, options, sink)
    }

    /// Assemble one assembly file into an object file.
    pub fn assemble(
        &self,
        src: &Path,
        dest: &Path,
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        stage(Stage::Assemble);
        self.assembler
            .assemble(src, dest, options.as_args(), sink)
            .map_err(Into::into)
    }

    /// Link the accumulated objects into an executable or shared library.
    pub fn link(&self, inputs: &[PathBuf], options: &Options, sink: &mut DiagnosticSink) -> Result<()> {
        stage(Stage::Link);
        if options.is_generating_shared_library() {
            self.generate_shared_library(inputs, options, sink)
        } else {
            self.generate_executable(inputs, options, sink)
        }
    }

    pub fn generate_executable(
        &self,
        inputs: &[PathBuf],
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        let dest = options.exe_file_name();
        self.linker.generate_executable(
            inputs,
            options.ld_args(),
            &dest,
            options.linker_options(),
            sink,
        )?;
        info!(dest = %dest.display(), "linked executable");
        Ok(())
    }

    pub fn generate_shared_library(
        &self,
        inputs: &[PathBuf],
        options: &Options,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        let dest = options.so_file_name();
        self.linker.generate_shared_library(
            inputs,
            options.ld_args(),
            &dest,
            options.linker_options(),
            sink,
        )?;
        info!(dest = %dest.display(), "linked shared library");
        Ok(())
    }
}

fn stage(stage: Stage) {
    debug!(stage = stage.name(), "{}", stage.description());
}
