//! services/responses_api/src/service/mod.rs
//!
//! The response service: every operation the router can dispatch to.
//! Each operation reads a JSON record, merges in memory, and writes it back through
//! the `ObjectStore` port with a precondition on the version it read.

mod fetch;
mod save;
mod uploads;

pub use uploads::UploadRegistration;

use crate::config::ServiceSettings;
use crate::error::ApiError;
use bytes::Bytes;
use response_store_core::{
    check_company_id, next_employee_id, EmployeeId, Lookup, NewObject, ObjectStore, PortError,
    WriteCondition,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Shared by the lambda handler and the local HTTP server; cheap to clone.
#[derive(Clone)]
pub struct ResponseService {
    store: Arc<dyn ObjectStore>,
    settings: ServiceSettings,
}

impl ResponseService {
    pub fn new(store: Arc<dyn ObjectStore>, settings: ServiceSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// The id the next new employee of `company_id` would receive.
    ///
    /// A listing failure is an error; no id is guessed.
    pub async fn next_employee_id(&self, company_id: &str) -> Result<EmployeeId, ApiError> {
        let ids = self.employee_ids(company_id).await?;
        Ok(next_employee_id(&ids))
    }

    async fn employee_ids(&self, company_id: &str) -> Result<Vec<EmployeeId>, ApiError> {
        let scheme = self.settings.key_scheme;
        let keys = self.store.list(&scheme.employee_prefix(company_id)).await?;
        Ok(scheme.employee_ids(company_id, &keys))
    }

    //=====================================================================================
    // Record I/O
    //=====================================================================================

    /// Reads and decodes the record at `key`, with the write condition that protects
    /// replacing exactly the version that was read.
    async fn load<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<(Option<T>, WriteCondition), ApiError> {
        let lookup = self.store.get(key).await?;
        let condition = WriteCondition::after_read(&lookup);
        let record = match lookup {
            Lookup::Found(object) => Some(decode(key, &object.body)?),
            Lookup::NotFound => None,
        };
        Ok((record, condition))
    }

    async fn write_json<T: Serialize>(
        &self,
        key: &str,
        record: &T,
        condition: WriteCondition,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| ApiError::Internal(format!("could not encode {}: {}", key, e)))?;
        self.store
            .put(key, NewObject::json(Bytes::from(body)), condition)
            .await?;
        Ok(())
    }

    /// Whether a failed attempt should be re-run from the read.
    fn retry_after(&self, err: &ApiError, attempt: u32) -> bool {
        let conflict = matches!(err, ApiError::Port(PortError::Conflict(_)));
        if conflict && attempt < self.settings.max_write_attempts {
            warn!(
                "Concurrent write detected ({}), retrying attempt {}/{}",
                err,
                attempt + 1,
                self.settings.max_write_attempts
            );
            return true;
        }
        false
    }
}

fn decode<T: DeserializeOwned>(key: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|source| ApiError::CorruptRecord {
        key: key.to_string(),
        source,
    })
}

/// The company id of a request, required and usable as a key segment.
fn required_company_id(company_id: Option<&str>) -> Result<&str, ApiError> {
    let company_id = company_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::missing(&["companyId"]))?;
    Ok(check_company_id(company_id)?)
}
