//! Error type definitions for the Storage module.

use std::sync::PoisonError;

use thiserror::Error;

/// Storage Errors while operating on a backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors when converting a value into bytes
    #[error("could not encode value for key {key:?}: {msg}")]
    Encode {
        /// The key being written
        key: Vec<u8>,
        /// Error message from the codec
        msg: String,
    },
    /// Errors when creating a value from bytes
    #[error("could not decode value at key {key:?}: {msg}")]
    Decode {
        /// The key being read
        key: Vec<u8>,
        /// Error message from the codec
        msg: String,
    },
    /// Tried to obtain a lock on a poisoned piece of data
    #[error("tried to obtain a lock on a poisoned piece of data")]
    PoisonedLock,
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(_value: PoisonError<T>) -> Self {
        StorageError::PoisonedLock
    }
}

/// Result type for the Storage module.
/// This is the only return type acceptable for any public method in a
/// storage backend.
pub type StorageResult<T> = Result<T, StorageError>;
