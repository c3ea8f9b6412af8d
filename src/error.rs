//! Crate-wide error type.
//!
//! Every failure surfaces as a single [`KmcError`] variant. There is no silent
//! recovery: callers propagate with `?` up to `main`, which prints one line and
//! exits non-zero (see `main.rs`).

use std::path::PathBuf;

use thiserror::Error;

/// The error kinds named in the design: `FileIo`, `BadFormat`, `BadArgument`,
/// `Unsupported`, `Internal`.
#[derive(Debug, Error)]
pub enum KmcError {
    /// Failed to open, read, or write a file.
    #[error("I/O error on '{path}': {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Short read or short write: fewer bytes moved than requested.
    #[error("short {op} on '{path}': expected {expected} bytes, got {actual}")]
    ShortIo {
        op: &'static str,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// Wrong magic bytes, unknown format version, or malformed section layout.
    #[error("bad format in '{path}': {details}")]
    BadFormat { path: PathBuf, details: String },

    /// A CLI flag, cutoff, or encoding spec was invalid.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// A feature named by the input is recognised but deliberately unsupported.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A path the design says should never be reachable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KmcError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn bad_format(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::BadFormat {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn short_io(op: &'static str, path: impl Into<PathBuf>, expected: usize, actual: usize) -> Self {
        Self::ShortIo {
            op,
            path: path.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, KmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_format_displays_path_and_details() {
        let err = KmcError::bad_format("db.kmc_pre", "missing KMCP magic");
        assert!(err.to_string().contains("db.kmc_pre"));
        assert!(err.to_string().contains("missing KMCP magic"));
    }

    #[test]
    fn short_io_reports_expected_and_actual() {
        let err = KmcError::short_io("read", "db.kmc_suf", 16, 4);
        let msg = err.to_string();
        assert!(msg.contains("expected 16"));
        assert!(msg.contains("got 4"));
    }
}
