//! Error types for the zrpc-codegen library.
//!
//! Only conditions that abort a whole generation run are errors. Unresolvable
//! types, missing options and unreadable sidecar files degrade to defaults
//! and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all generator operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A generated unit name would escape the output directory
    #[error("path traversal detected: '{path}' would escape output directory")]
    PathTraversal {
        /// The suspicious path
        path: PathBuf,
    },

    /// Invalid protobuf wire format
    #[error("invalid protobuf wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode the generation request or descriptor set
    #[error("failed to decode generation request: {0}")]
    RequestDecode(#[from] prost::DecodeError),

    /// A file named in `file_to_generate` is not part of the supplied schema set
    #[error("file to generate '{name}' was not found in the request")]
    MissingFile {
        /// The requested file name
        name: String,
    },

    /// Malformed plugin parameter
    #[error("invalid plugin parameter '{param}': {details}")]
    InvalidParameter {
        /// The offending parameter token
        param: String,
        /// What was wrong with it
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new missing file error
    pub fn missing_file(name: impl Into<String>) -> Self {
        Self::MissingFile { name: name.into() }
    }

    /// Creates a new invalid parameter error
    pub fn invalid_parameter(param: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::path_traversal("../escape_client.rs");
        assert!(err.to_string().contains("path traversal"));
        assert!(err.to_string().contains("../escape_client.rs"));

        let err = Error::missing_file("service.proto");
        assert_eq!(
            err.to_string(),
            "file to generate 'service.proto' was not found in the request"
        );

        let err = Error::invalid_wire_format(2, "truncated varint");
        assert_eq!(
            err.to_string(),
            "invalid protobuf wire format at offset 2: truncated varint"
        );
    }
}
