//! crates/response_store_core/src/ports.rs
//!
//! Defines the storage contract the response store is built on.
//! The trait forms the boundary of the hexagonal architecture, keeping the core
//! independent of a specific object store (S3 in production, memory in tests).

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// A missing key is not an error; reads report it through [`Lookup::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// A conditional write lost against a concurrent writer.
    #[error("Write conflict on {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Values
//=========================================================================================

/// Outcome of a read: the object, or an explicit absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

/// An object read back from storage, with the version token used for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub version: Option<String>,
}

/// An object about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub body: Bytes,
    pub content_type: String,
    /// Descriptive metadata attached to the object (not part of the body).
    pub metadata: BTreeMap<String, String>,
}

impl NewObject {
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: "application/json".to_string(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Precondition checked by the store before a write is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    Unconditional,
    /// Only create; fail with [`PortError::Conflict`] if the key exists.
    IfAbsent,
    /// Only replace the object whose version token matches.
    IfVersion(String),
}

impl WriteCondition {
    /// The condition that protects a read-modify-write of the object read as `previous`.
    pub fn after_read(previous: &Lookup<StoredObject>) -> Self {
        match previous {
            Lookup::Found(StoredObject {
                version: Some(version),
                ..
            }) => WriteCondition::IfVersion(version.clone()),
            Lookup::Found(_) => WriteCondition::Unconditional,
            Lookup::NotFound => WriteCondition::IfAbsent,
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// The bucket (or container) every key of this store lives in.
    fn bucket(&self) -> &str;

    async fn get(&self, key: &str) -> PortResult<Lookup<StoredObject>>;

    async fn put(&self, key: &str, object: NewObject, condition: WriteCondition) -> PortResult<()>;

    /// Every key starting with `prefix`, across all result pages.
    async fn list(&self, prefix: &str) -> PortResult<Vec<String>>;

    /// A time-limited URL a client can `PUT` the object to directly.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> PortResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_condition_follows_the_read() {
        assert_eq!(WriteCondition::after_read(&Lookup::NotFound), WriteCondition::IfAbsent);

        let versioned = Lookup::Found(StoredObject {
            body: Bytes::from_static(b"{}"),
            version: Some("\"etag-1\"".into()),
        });
        assert_eq!(
            WriteCondition::after_read(&versioned),
            WriteCondition::IfVersion("\"etag-1\"".into())
        );

        let unversioned = Lookup::Found(StoredObject {
            body: Bytes::new(),
            version: None,
        });
        assert_eq!(WriteCondition::after_read(&unversioned), WriteCondition::Unconditional);
    }
}
