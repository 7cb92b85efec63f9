//! Input files and their per-file pipeline state.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Extension of compilable Cinder sources.
pub const EXT_SOURCE: &str = "cn";
/// Extension of assembly sources.
pub const EXT_ASSEMBLY: &str = "s";
/// Extension of object files.
pub const EXT_OBJECT: &str = "o";

/// What kind of representation an artifact holds.
///
/// Ordered by pipeline position: a file only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// A compilable source file.
    Source,
    /// Assembly text.
    Assembly,
    /// An object file or other linker input (archive, shared library).
    Object,
}

impl SourceKind {
    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Option<SourceKind> {
        match path.extension()?.to_str()? {
            EXT_SOURCE => Some(SourceKind::Source),
            EXT_ASSEMBLY => Some(SourceKind::Assembly),
            EXT_OBJECT | "a" | "so" => Some(SourceKind::Object),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Source => write!(f, "source"),
            SourceKind::Assembly => write!(f, "assembly"),
            SourceKind::Object => write!(f, "object"),
        }
    }
}

/// The most recently produced representation of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where the representation lives.
    pub path: PathBuf,
    /// What the representation is.
    pub kind: SourceKind,
}

impl Artifact {
    /// Create an artifact.
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// One input file of a build, together with its current artifact.
///
/// The original path never changes. Each stage the file passes through
/// produces a new `SourceFile` via [`SourceFile::advance`]; the value is
/// threaded through the build rather than mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    original: PathBuf,
    current: Artifact,
}

impl SourceFile {
    /// Create a source file whose current artifact is the original input.
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        let path = path.into();
        Self {
            current: Artifact::new(path.clone(), kind),
            original: path,
        }
    }

    /// The path given on the command line.
    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// Path of the most recently produced representation.
    pub fn path(&self) -> &Path {
        &self.current.path
    }

    /// Kind of the most recently produced representation.
    pub fn kind(&self) -> SourceKind {
        self.current.kind
    }

    /// The current artifact.
    pub fn current(&self) -> &Artifact {
        &self.current
    }

    /// Whether the current artifact is a compilable source.
    pub fn is_source(&self) -> bool {
        self.current.kind == SourceKind::Source
    }

    /// Whether the current artifact is assembly text.
    pub fn is_assembly(&self) -> bool {
        self.current.kind == SourceKind::Assembly
    }

    /// Whether the current artifact is an object file or linker input.
    pub fn is_object(&self) -> bool {
        self.current.kind == SourceKind::Object
    }

    /// File name of the original input without directory or extension.
    pub fn stem(&self) -> String {
        self.original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The original path with its extension replaced.
    pub fn with_extension(&self, ext: &str) -> PathBuf {
        self.original.with_extension(ext)
    }

    /// Default assembly destination for this input.
    pub fn asm_file_name(&self) -> PathBuf {
        self.with_extension(EXT_ASSEMBLY)
    }

    /// Default object destination for this input.
    pub fn obj_file_name(&self) -> PathBuf {
        self.with_extension(EXT_OBJECT)
    }

    /// Record that a stage produced `next`.
    ///
    /// Artifacts only move forward through the pipeline, so `next` must be
    /// of a later kind than the current artifact.
    pub fn advance(self, next: Artifact) -> Self {
        debug_assert!(
            next.kind > self.current.kind,
            "{} cannot advance from {} to {}",
            self.original.display(),
            self.current.kind,
            next.kind
        );
        Self {
            original: self.original,
            current: next,
        }
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            SourceKind::from_path(Path::new("a/main.cn")),
            Some(SourceKind::Source)
        );
        assert_eq!(
            SourceKind::from_path(Path::new("start.s")),
            Some(SourceKind::Assembly)
        );
        assert_eq!(
            SourceKind::from_path(Path::new("libfoo.a")),
            Some(SourceKind::Object)
        );
        assert_eq!(SourceKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_new_file_points_at_original() {
        let file = SourceFile::new("src/main.cn", SourceKind::Source);
        assert_eq!(file.path(), Path::new("src/main.cn"));
        assert_eq!(file.original_path(), Path::new("src/main.cn"));
        assert!(file.is_source());
        assert_eq!(file.stem(), "main");
    }

    #[test]
    fn test_default_destinations_keep_directory() {
        let file = SourceFile::new("src/main.cn", SourceKind::Source);
        assert_eq!(file.asm_file_name(), PathBuf::from("src/main.s"));
        assert_eq!(file.obj_file_name(), PathBuf::from("src/main.o"));
    }

    #[test]
    fn test_advance_moves_forward() {
        let file = SourceFile::new("main.cn", SourceKind::Source);
        let file = file.advance(Artifact::new("main.s", SourceKind::Assembly));
        assert!(file.is_assembly());
        assert_eq!(file.path(), Path::new("main.s"));

        let file = file.advance(Artifact::new("main.o", SourceKind::Object));
        assert!(file.is_object());
        assert_eq!(file.original_path(), Path::new("main.cn"));
    }

    #[test]
    #[should_panic(expected = "cannot advance")]
    fn test_advance_rejects_same_stage_twice() {
        let file = SourceFile::new("main.cn", SourceKind::Source)
            .advance(Artifact::new("main.s", SourceKind::Assembly));
        let _ = file.advance(Artifact::new("other.s", SourceKind::Assembly));
    }
}
