//! Names of the pipeline stages.

use std::fmt;

/// One step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parse,
    ResolveLocals,
    ResolveTypes,
    CheckTypeTable,
    CheckDereferences,
    CheckTypes,
    GenerateIr,
    GenerateAssembly,
    Write,
    Assemble,
    Link,
}

impl Stage {
    /// The name used in logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::ResolveLocals => "resolve-locals",
            Stage::ResolveTypes => "resolve-types",
            Stage::CheckTypeTable => "check-type-table",
            Stage::CheckDereferences => "check-dereferences",
            Stage::CheckTypes => "check-types",
            Stage::GenerateIr => "generate-ir",
            Stage::GenerateAssembly => "generate-assembly",
            Stage::Write => "write",
            Stage::Assemble => "assemble",
            Stage::Link => "link",
        }
    }

    /// What the stage does.
    pub fn description(self) -> &'static str {
        match self {
            Stage::Parse => "read the source file and build a syntax tree",
            Stage::ResolveLocals => "bind every name use to its declaration",
            Stage::ResolveTypes => "resolve type expressions",
            Stage::CheckTypeTable => "check type definitions for consistency",
            Stage::CheckDereferences => "check lvalues and call targets",
            Stage::CheckTypes => "type-check every expression",
            Stage::GenerateIr => "lower the checked tree to intermediate code",
            Stage::GenerateAssembly => "generate target assembly",
            Stage::Write => "write assembly to its destination",
            Stage::Assemble => "run the external assembler",
            Stage::Link => "run the external linker",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
