//! Error handling for the roast importer

use std::path::PathBuf;

use roastlog::IngestError;
use thiserror::Error;

/// Import error types
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Roast with UUID {roast_uuid} already exists")]
    DuplicateIdentifier { roast_uuid: String },

    #[error("Invalid file type: {filename}")]
    InvalidFileType { filename: String },

    #[error("Failed to parse roast log: {0}")]
    Ingest(#[from] IngestError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ImportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImportError::Io {
            path: path.into(),
            source,
        }
    }

    /// Error code carried into the per-file report
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            ImportError::InvalidFileType { .. } => "INVALID_FILE_TYPE",
            ImportError::Ingest(e) => e.code(),
            ImportError::Io { .. } => "IO_ERROR",
            ImportError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type alias for importer operations
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let dup = ImportError::DuplicateIdentifier {
            roast_uuid: "abc".to_string(),
        };
        assert_eq!(dup.code(), "DUPLICATE_IDENTIFIER");
        assert_eq!(dup.to_string(), "Roast with UUID abc already exists");

        let ingest: ImportError = IngestError::MissingRequiredField {
            field: "title".to_string(),
        }
        .into();
        assert_eq!(ingest.code(), "MISSING_REQUIRED_FIELD");
    }
}
