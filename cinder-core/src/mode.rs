//! Stage selection.
//!
//! A [`Mode`] names the point at which one invocation of the compiler stops:
//! either a diagnostic dump of some intermediate representation, or one of
//! the three pipeline depths (compile, assemble, link).

use std::fmt;

/// The processing mode of one compiler invocation.
///
/// Variants are declared in pipeline order; the derived `Ord` follows
/// declaration order and is what [`Mode::requires`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Mode {
    /// Parse only and report a per-file verdict.
    CheckSyntax,
    /// Print the token stream.
    DumpTokens,
    /// Print the parsed syntax tree.
    DumpAst,
    /// Print the single statement of `main`.
    DumpStmt,
    /// Print the single expression of `main`.
    DumpExpr,
    /// Print the fully checked syntax tree.
    DumpSemantic,
    /// Print the tree after name and type resolution only.
    DumpReference,
    /// Print the intermediate code.
    DumpIr,
    /// Print the generated assembly as structured data.
    DumpAsm,
    /// Print the generated assembly text.
    PrintAsm,
    /// Stop after writing assembly (`-S`).
    Compile,
    /// Stop after writing object files (`-c`).
    Assemble,
    /// Compile, assemble and link.
    #[default]
    Link,
}

/// Command-line tokens registered for mode selection, in declaration order.
const REGISTERED: [(&str, Mode); 12] = [
    ("--check-syntax", Mode::CheckSyntax),
    ("--dump-tokens", Mode::DumpTokens),
    ("--dump-ast", Mode::DumpAst),
    ("--dump-stmt", Mode::DumpStmt),
    ("--dump-expr", Mode::DumpExpr),
    ("--dump-semantic", Mode::DumpSemantic),
    ("--dump-reference", Mode::DumpReference),
    ("--dump-ir", Mode::DumpIr),
    ("--dump-asm", Mode::DumpAsm),
    ("--print-asm", Mode::PrintAsm),
    ("-S", Mode::Compile),
    ("-c", Mode::Assemble),
];

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Mode; 13] = [
        Mode::CheckSyntax,
        Mode::DumpTokens,
        Mode::DumpAst,
        Mode::DumpStmt,
        Mode::DumpExpr,
        Mode::DumpSemantic,
        Mode::DumpReference,
        Mode::DumpIr,
        Mode::DumpAsm,
        Mode::PrintAsm,
        Mode::Compile,
        Mode::Assemble,
        Mode::Link,
    ];

    /// Iterate over the registered command-line tokens and their modes.
    pub fn registered() -> impl Iterator<Item = (&'static str, Mode)> {
        REGISTERED.iter().copied()
    }

    /// Look up the mode selected by a command-line token.
    pub fn lookup(option: &str) -> Option<Mode> {
        REGISTERED
            .iter()
            .find(|(token, _)| *token == option)
            .map(|(_, mode)| *mode)
    }

    /// Whether `option` is a registered mode token.
    pub fn is_mode_option(option: &str) -> bool {
        Self::lookup(option).is_some()
    }

    /// Resolve a registered mode token.
    ///
    /// # Panics
    ///
    /// Panics if `option` is not registered. Callers only pass tokens taken
    /// from [`Mode::registered`], so an unknown token is a bug in the caller.
    pub fn from_option(option: &str) -> Mode {
        match Self::lookup(option) {
            Some(mode) => mode,
            None => panic!("must not happen: unknown mode option: {option}"),
        }
    }

    /// The command-line token selecting this mode.
    ///
    /// `Link` is the implicit default and has no token.
    pub fn option(self) -> Option<&'static str> {
        REGISTERED
            .iter()
            .find(|(_, mode)| *mode == self)
            .map(|(token, _)| *token)
    }

    /// Position of this mode in declaration order.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Whether this mode names one of the pipeline depths.
    pub fn is_pipeline_depth(self) -> bool {
        matches!(self, Mode::Compile | Mode::Assemble | Mode::Link)
    }

    /// Whether this mode stops the pipeline to print a representation.
    pub fn is_dump(self) -> bool {
        !matches!(
            self,
            Mode::CheckSyntax | Mode::Compile | Mode::Assemble | Mode::Link
        )
    }

    /// Whether running in this mode requires reaching the `other` depth.
    ///
    /// Only meaningful when `other` is `Compile`, `Assemble` or `Link`; the
    /// dump modes sit below every depth and so never require one.
    pub fn requires(self, other: Mode) -> bool {
        debug_assert!(
            other.is_pipeline_depth(),
            "requires() compares against a pipeline depth, got {other:?}"
        );
        self >= other
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.option() {
            Some(token) => f.write_str(token),
            None => f.write_str("--link"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_build() {
        assert_eq!(Mode::default(), Mode::Link);
    }

    #[test]
    fn test_token_mapping_is_bidirectional() {
        for (token, mode) in Mode::registered() {
            assert_eq!(Mode::from_option(token), mode);
            assert_eq!(mode.option(), Some(token));
        }
        assert_eq!(Mode::Link.option(), None);
        assert_eq!(Mode::registered().count(), Mode::ALL.len() - 1);
    }

    #[test]
    fn test_lookup_unregistered() {
        assert!(!Mode::is_mode_option("--link"));
        assert!(!Mode::is_mode_option("-o"));
        assert_eq!(Mode::lookup("--dump-ir"), Some(Mode::DumpIr));
    }

    #[test]
    #[should_panic(expected = "unknown mode option")]
    fn test_from_option_panics_on_unknown_token() {
        Mode::from_option("--dump-everything");
    }

    #[test]
    fn test_order_follows_declaration() {
        for (i, mode) in Mode::ALL.iter().enumerate() {
            assert_eq!(mode.ordinal(), i);
        }
        assert!(Mode::CheckSyntax < Mode::DumpTokens);
        assert!(Mode::PrintAsm < Mode::Compile);
    }

    #[test]
    fn test_requires_among_depths() {
        assert!(Mode::Link.requires(Mode::Assemble));
        assert!(Mode::Link.requires(Mode::Link));
        assert!(Mode::Assemble.requires(Mode::Assemble));
        assert!(!Mode::Assemble.requires(Mode::Link));
        assert!(!Mode::Compile.requires(Mode::Assemble));
        assert!(!Mode::DumpIr.requires(Mode::Assemble));
        assert!(!Mode::CheckSyntax.requires(Mode::Compile));
    }

    #[test]
    fn test_dump_classification() {
        let dumps: Vec<Mode> = Mode::ALL.into_iter().filter(|m| m.is_dump()).collect();
        assert_eq!(dumps.len(), 9);
        assert!(!Mode::CheckSyntax.is_dump());
        assert!(Mode::PrintAsm.is_dump());
    }

    #[test]
    fn test_display_uses_token() {
        assert_eq!(Mode::Compile.to_string(), "-S");
        assert_eq!(Mode::Link.to_string(), "--link");
    }
}
