//! Persistence port — opaque records addressed by string keys.

use std::future::Future;

use sprinkler_domain::error::SprinklerError;

/// Key/value record persistence.
///
/// Each call is atomic for its key. Deleting an absent key succeeds.
pub trait RecordStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn write(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<(), SprinklerError>> + Send;

    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, SprinklerError>> + Send;

    /// Remove `key`.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), SprinklerError>> + Send;
}

impl<T: RecordStore> RecordStore for std::sync::Arc<T> {
    fn write(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<(), SprinklerError>> + Send {
        (**self).write(key, value)
    }

    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, SprinklerError>> + Send {
        (**self).read(key)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), SprinklerError>> + Send {
        (**self).delete(key)
    }
}
