//! Error types for office document normalization and extraction.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while normalizing, extracting or packaging.
#[derive(Error, Debug)]
pub enum Error {
    /// A missing input path, or a missing part inside a package.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No access to read or write a path.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The input is not a valid document of the expected kind, or a legacy
    /// document could not be converted.
    #[error("Invalid or unsupported document: {0}")]
    FormatError(String),

    /// A caller-supplied setting is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// ZIP archive error while reading or writing a package.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// PDF object model error.
    #[error("PDF error: {0}")]
    PdfError(String),

    /// An external executable could not be run or reported failure.
    #[error("External process error: {0}")]
    ProcessError(String),

    /// Some files of a batch failed while others succeeded.
    #[error("{failed} of {total} files failed")]
    PartialBatchFailure { failed: usize, total: usize },
}

impl Error {
    /// Classify an I/O error against the path it concerns.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.display().to_string()),
            kind => Error::IoError(io::Error::new(kind, format!("{}: {}", path.display(), err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kinds() {
        let path = Path::new("deck.pptx");

        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, Error::NotFound(ref p) if p == "deck.pptx"));

        let err = Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, Error::PermissionDenied(_)));

        let err = Error::from_io(io::Error::new(io::ErrorKind::Other, "disk full"), path);
        match err {
            Error::IoError(inner) => assert!(inner.to_string().contains("deck.pptx")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_partial_failure_message() {
        let err = Error::PartialBatchFailure { failed: 1, total: 3 };
        assert_eq!(err.to_string(), "1 of 3 files failed");
    }
}
