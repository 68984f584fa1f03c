//! services/responses_api/src/web/envelope.rs
//!
//! The proxy-integration request and response envelopes shared by the lambda entry
//! point and the local HTTP server.

use crate::error::ApiError;
use crate::payloads::ErrorResponse;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{error, warn};

/// An API Gateway style proxy request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    #[serde(default)]
    pub http_method: String,
    /// The route template, e.g. `/company-status/{companyId}`.
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ApiRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            http_method: method.to_string(),
            path: Some(path.to_string()),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters.as_ref()?.get(name).map(String::as_str)
    }

    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()?
            .get(name)
            .map(String::as_str)
    }

    /// The body as text, decoding it first when the front door base64-encoded it.
    pub fn body_text(&self) -> Result<Option<String>, ApiError> {
        let Some(body) = self.body.as_deref().filter(|b| !b.trim().is_empty()) else {
            return Ok(None);
        };
        if !self.is_base64_encoded {
            return Ok(Some(body.to_string()));
        }
        let bytes = STANDARD
            .decode(body)
            .map_err(|e| ApiError::Validation(format!("Request body is not valid base64: {}", e)))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ApiError::Validation(format!("Request body is not valid UTF-8: {}", e)))
    }
}

/// An API Gateway style proxy response. CORS headers are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self {
                status_code,
                headers: cors_headers(),
                body,
            },
            Err(e) => Self::from_error(&ApiError::Internal(format!(
                "could not encode response: {}",
                e
            ))),
        }
    }

    pub fn from_error(err: &ApiError) -> Self {
        let status_code = err.status_code();
        if status_code >= 500 {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected ({}): {}", status_code, err);
        }
        let body = ErrorResponse {
            error: err.to_string(),
        };
        Self {
            status_code,
            headers: cors_headers(),
            body: serde_json::to_string(&body)
                .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string()),
        }
    }
}

fn cors_headers() -> BTreeMap<String, String> {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Content-Type"),
        ("Access-Control-Allow-Methods", "OPTIONS,POST,GET"),
        ("Content-Type", "application/json"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}
