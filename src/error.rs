//! Error types and the related `ZipResult<T>`

use std::io;

use thiserror::Error;

use crate::zip::decoder::OutOfBounds;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// The bytes we fetched don't form a readable ZIP archive.
    #[error("Invalid Zip archive: {0}")]
    Format(String),

    /// No decompressor is registered for the entry's compression method.
    #[error("Unsupported compression method {method} for {name}")]
    UnsupportedAlgorithm { name: String, method: u16 },

    /// The decompressed length didn't match the length the central directory declared.
    ///
    /// Either the entry is corrupt or the range we fetched didn't cover its
    /// whole compressed body.
    #[error("Unexpected end of data in {name}: expected {expected} bytes, got {actual}")]
    UnexpectedEof {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// The decompressor gave up on the entry's compressed body.
    #[error("Couldn't decompress {name}")]
    Decompress {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The entry is encrypted (decryption is unsupported)
    #[error("{0} is encrypted")]
    Encrypted(String),

    /// The object store couldn't give us the bytes we asked for.
    #[error("Couldn't read {object}: {reason}")]
    RemoteAccess { object: String, reason: String },

    /// The caller's inputs don't fit together.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ZipError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        ZipError::Format(message.into())
    }

    pub(crate) fn remote(object: impl ToString, reason: impl ToString) -> Self {
        ZipError::RemoteAccess {
            object: object.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<OutOfBounds> for ZipError {
    fn from(e: OutOfBounds) -> Self {
        ZipError::Format(format!("truncated record: {e}"))
    }
}
