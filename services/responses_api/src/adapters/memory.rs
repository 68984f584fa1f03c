//! services/responses_api/src/adapters/memory.rs
//!
//! An in-process implementation of the `ObjectStore` port.
//! Backs `STORAGE_BACKEND=memory` for local development and serves as the test double
//! for the service and router tests.

use async_trait::async_trait;
use bytes::Bytes;
use response_store_core::ports::{
    Lookup, NewObject, ObjectStore, PortError, PortResult, StoredObject, WriteCondition,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct MemoryObject {
    body: Bytes,
    content_type: String,
    metadata: BTreeMap<String, String>,
    version: u64,
}

/// A bucket held in memory, with version counters standing in for ETags.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, MemoryObject>>,
    next_version: AtomicU64,
    calls: AtomicUsize,
    injected_conflicts: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            next_version: AtomicU64::new(1),
            calls: AtomicUsize::new(0),
            injected_conflicts: AtomicUsize::new(0),
            fail_listing: AtomicBool::new(false),
        }
    }

    /// Number of storage operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next `count` conditional writes fail as if another writer got there first.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Makes every `list` call fail until switched off again.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Writes an object directly, bypassing call counting and preconditions.
    pub async fn seed(&self, key: &str, body: impl Into<Bytes>) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().await.insert(
            key.to_string(),
            MemoryObject {
                body: body.into(),
                content_type: "application/json".to_string(),
                metadata: BTreeMap::new(),
                version,
            },
        );
    }

    /// The stored body, content type and metadata for `key`.
    pub async fn object(&self, key: &str) -> Option<(Bytes, String, BTreeMap<String, String>)> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|o| (o.body.clone(), o.content_type.clone(), o.metadata.clone()))
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(&self, key: &str) -> PortResult<Lookup<StoredObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().await;
        Ok(match objects.get(key) {
            Some(object) => Lookup::Found(StoredObject {
                body: object.body.clone(),
                version: Some(object.version.to_string()),
            }),
            None => Lookup::NotFound,
        })
    }

    async fn put(&self, key: &str, object: NewObject, condition: WriteCondition) -> PortResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if condition != WriteCondition::Unconditional && self.take_injected_conflict() {
            return Err(PortError::Conflict(key.to_string()));
        }

        let mut objects = self.objects.lock().await;
        let current = objects.get(key).map(|o| o.version.to_string());
        let allowed = match (&condition, &current) {
            (WriteCondition::Unconditional, _) => true,
            (WriteCondition::IfAbsent, existing) => existing.is_none(),
            (WriteCondition::IfVersion(expected), Some(actual)) => expected == actual,
            (WriteCondition::IfVersion(_), None) => false,
        };
        if !allowed {
            return Err(PortError::Conflict(key.to_string()));
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        objects.insert(
            key.to_string(),
            MemoryObject {
                body: object.body,
                content_type: object.content_type,
                metadata: object.metadata,
                version,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected(format!("listing {} is unavailable", prefix)));
        }
        let objects = self.objects.lock().await;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "memory://{}/{}?method=PUT&contentType={}&expires={}",
            self.bucket,
            key,
            content_type,
            expires_in.as_secs()
        ))
    }
}
