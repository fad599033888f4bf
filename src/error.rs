//! Error types for the hdfs client.

use thiserror::Error;

/// Main error type for filesystem operations.
#[derive(Error, Debug)]
pub enum HdfsError {
    /// The path does not exist.
    #[error("File does not exist: {0}")]
    NotFound(String),

    /// The path already exists (or is a directory where a file was expected).
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// An ancestor of the path is a file.
    #[error("Parent path is not a directory: {0}")]
    ParentNotDirectory(String),

    /// Non-recursive delete of a directory with children.
    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("Unsupported filesystem scheme: {0}")]
    UnsupportedScheme(String),

    /// A configuration property has a value of the wrong shape.
    #[error("Invalid value for {key}: {value}")]
    Config { key: String, value: String },

    /// Modified UTF-8 encoding longer than a u16 length prefix allows.
    #[error("Encoded string too long: {0} bytes")]
    UtfTooLong(usize),

    #[error("Stream is closed")]
    StreamClosed,

    #[error("Cannot seek to {pos}, file length is {len}")]
    SeekPastEof { pos: u64, len: u64 },

    /// No datanode accepted a replica of a new block.
    #[error("File {path} could only be replicated to 0 nodes")]
    NoReplicas { path: String, offset: u64 },

    /// Every replica of a block failed checksum verification.
    #[error("Checksum mismatch in {path} at offset {offset}")]
    ChecksumMismatch { path: String, offset: u64 },

    /// HTTP error without a RemoteException body.
    #[error("HTTP error: {0}")]
    Http(u16),

    /// The NameNode answered in a shape the client does not understand.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// RemoteException reported by the NameNode.
    #[error("{exception}: {message}")]
    Remote { exception: String, message: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for filesystem operations.
pub type Result<T> = std::result::Result<T, HdfsError>;
