//! services/responses_api/src/lib.rs
//!
//! The questionnaire response store: storage adapters, the response service, and the
//! proxy-envelope router shared by the lambda and the local HTTP server.

pub mod adapters;
pub mod config;
pub mod error;
pub mod payloads;
pub mod service;
pub mod web;

use adapters::{MemoryStore, S3Store};
use config::{Config, StorageBackend};
use response_store_core::ObjectStore;
use service::ResponseService;
use std::sync::Arc;
use tracing::info;

/// Builds the service over the storage backend named in `config`.
pub async fn build_service(config: &Config) -> ResponseService {
    let store: Arc<dyn ObjectStore> = match config.storage_backend {
        StorageBackend::S3 => Arc::new(
            S3Store::connect(config.responses_bucket.clone(), config.aws_region.clone()).await,
        ),
        StorageBackend::Memory => Arc::new(MemoryStore::new(config.responses_bucket.clone())),
    };
    info!(
        "Using {:?} storage, bucket '{}', {} key scheme",
        config.storage_backend, config.responses_bucket, config.service.key_scheme
    );
    ResponseService::new(store, config.service)
}
