//! Writing generated text to its destination.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use cinder_core::{Destination, DiagnosticSink, FileError};
use tracing::debug;

const STAGE: &str = "write";

/// Write `content` to `dest`, or to `out` for the standard output sentinel.
///
/// The file handle lives only for the duration of this call and is closed
/// on every exit path. Failures are reported to the sink where they are
/// detected and returned as a uniform [`FileError::Write`].
pub fn write_file(
    dest: &Destination,
    content: &str,
    out: &mut dyn Write,
    sink: &mut DiagnosticSink,
) -> Result<(), FileError> {
    match dest {
        Destination::Stdout => {
            debug!("writing output to stdout");
            out.write_all(content.as_bytes())
                .and_then(|()| out.flush())
                .map_err(|e| {
                    sink.error(STAGE, format!("IO error: {e}"));
                    FileError::Write {
                        path: "-".into(),
                    }
                })
        }
        Destination::Path(path) => {
            debug!(path = %path.display(), "writing output file");
            write_to_path(path, content).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    sink.error(STAGE, format!("file not found: {}", path.display()));
                } else {
                    sink.error(STAGE, format!("IO error: {}: {e}", path.display()));
                }
                FileError::Write { path: path.clone() }
            })
        }
    }
}

fn write_to_path(path: &Path, content: &str) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(content.as_bytes())?;
    writer.flush()
}
