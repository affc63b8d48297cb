//! Generic storage abstraction over byte-oriented backends.
//!
//! A [`Storage`] implementation only knows how to move opaque byte
//! strings in and out of some medium. Typed access is layered on top:
//! any type that is serde-serializable gets a [`Storable`]
//! implementation for free, and [`StorageHelper`] exposes typed
//! `get_t`/`put_t` on every backend.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StorageError, StorageResult};

/// Key/value storage over raw bytes.
///
/// Implementations must be safe to share across threads behind an
/// `Arc`, hence all methods take `&self`.
pub trait Storage {
    /// Get a value from the storage given a key
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a value in the storage under a given key
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Delete the value associated with a key, if any
    fn delete(&self, key: &[u8]) -> StorageResult<()>;
}

/// Values that can be persisted in a [`Storage`] backend.
pub trait Storable: Sized {
    /// Serialize the value into bytes
    fn to_bytes(&self) -> Result<Vec<u8>, String>;

    /// Deserialize the value from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, String>;
}

impl<T> Storable for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        bincode::serialize(self).map_err(|e| e.to_string())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}

/// Typed view over a byte-oriented [`Storage`].
pub trait StorageHelper: Storage {
    /// Get a typed value from the storage given a key
    fn get_t<T: Storable>(&self, key: &[u8]) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = T::from_bytes(&bytes).map_err(|msg| StorageError::Decode {
                    key: key.to_vec(),
                    msg,
                })?;

                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Put a typed value in the storage under a given key
    fn put_t<T: Storable>(&self, key: Vec<u8>, value: &T) -> StorageResult<()> {
        let bytes = value.to_bytes().map_err(|msg| StorageError::Encode {
            key: key.clone(),
            msg,
        })?;

        self.put(key, bytes)
    }
}

impl<T: Storage + ?Sized> StorageHelper for T {}
