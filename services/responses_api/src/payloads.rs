//! services/responses_api/src/payloads.rs
//!
//! Request and response bodies exchanged with the questionnaire client.
//! Field names follow the camelCase JSON the web form already sends.

use chrono::{DateTime, Utc};
use response_store_core::domain::flexible_id;
use response_store_core::{
    CompanyRecord, CompletionSignals, EmployeeId, EmployeeRecord, FileUploadMetadata, Responses,
    StatusLabel,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests
//=========================================================================================

/// A questionnaire submission for a company or one of its employees.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub company_id: Option<String>,
    /// `company` or `employee`.
    pub form_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub responses: Option<Responses>,
    /// A number or a numeric string.
    #[serde(default, deserialize_with = "flexible_id::option::deserialize")]
    #[schema(value_type = Option<u64>)]
    pub employee_id: Option<EmployeeId>,
    #[serde(default)]
    pub is_new_employee: bool,
    #[schema(value_type = Option<Object>)]
    pub file_metadata: Option<FileUploadMetadata>,
    #[serde(default)]
    pub complete_audit: bool,
    #[serde(default)]
    pub force_complete: bool,
    #[serde(default)]
    pub prevent_auto_complete: bool,
}

impl SaveRequest {
    pub fn signals(&self) -> CompletionSignals {
        CompletionSignals {
            complete_audit: self.complete_audit,
            force_complete: self.force_complete,
            prevent_auto_complete: self.prevent_auto_complete,
        }
    }
}

/// Identifies a company, and optionally one of its employees, for a read.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id::option::deserialize")]
    #[schema(value_type = Option<u64>)]
    pub employee_id: Option<EmployeeId>,
}

/// Asks for a URL the client can upload a file to directly.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub s3_key: Option<String>,
    pub bucket: Option<String>,
    /// Only `PUT` is supported.
    pub method: Option<String>,
    /// Lifetime of the URL in seconds.
    pub expires: Option<u64>,
}

/// A file sent through the service instead of a presigned URL.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    /// Base64-encoded file content.
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub s3_key: Option<String>,
    pub bucket: Option<String>,
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id::option::deserialize")]
    #[schema(value_type = Option<u64>)]
    pub employee_id: Option<EmployeeId>,
    pub question_id: Option<String>,
    pub question_text: Option<String>,
    /// Extra object metadata; non-string values are stored as their JSON text.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
    /// Also write an entry to the upload-metadata registry.
    #[serde(default)]
    pub register_metadata: bool,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveCompanyResponse {
    pub success: bool,
    pub message: String,
    /// The storage key the record was written to.
    pub filename: String,
    pub company_id: String,
    pub completion_percentage: u8,
    pub in_progress: bool,
    pub explicitly_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveEmployeeResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub company_id: String,
    #[schema(value_type = u64)]
    pub employee_id: EmployeeId,
    pub completion_percentage: u8,
    pub explicitly_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

/// Either save outcome, as returned by the generic submission route.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum SaveResponse {
    Company(SaveCompanyResponse),
    Employee(SaveEmployeeResponse),
}

/// A read that found nothing; reported with status 200.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub found: bool,
    #[schema(value_type = Object)]
    pub responses: Responses,
    pub message: String,
}

impl NotFoundResponse {
    pub fn new(message: String) -> Self {
        Self {
            found: false,
            responses: Responses::new(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFoundResponse {
    pub found: bool,
    #[schema(value_type = Object)]
    pub company_data: CompanyRecord,
    #[schema(value_type = Object)]
    pub responses: Responses,
    pub last_modified: DateTime<Utc>,
    pub completion_percentage: u8,
    pub in_progress: bool,
    pub explicitly_completed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CompanyDataResponse {
    Found(CompanyFoundResponse),
    Missing(NotFoundResponse),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFoundResponse {
    pub found: bool,
    #[schema(value_type = Object)]
    pub employee_data: EmployeeRecord,
    #[schema(value_type = Object)]
    pub responses: Responses,
    pub last_modified: DateTime<Utc>,
    #[schema(value_type = u64)]
    pub employee_id: EmployeeId,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EmployeeDataResponse {
    Found(EmployeeFoundResponse),
    Missing(NotFoundResponse),
}

/// Aggregate progress of a company and its employees.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatusResponse {
    pub company_id: String,
    /// `completed`, `in-progress` or `not-started`.
    #[schema(value_type = String)]
    pub status: StatusLabel,
    pub company_completed: bool,
    pub company_in_progress: bool,
    pub completion_percentage: u8,
    pub last_modified: Option<DateTime<Utc>>,
    pub employee_count: usize,
    #[schema(value_type = Vec<u64>)]
    pub employee_ids: Vec<EmployeeId>,
    #[schema(value_type = u64)]
    pub next_employee_id: EmployeeId,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub company_id: String,
    pub employee_count: usize,
    #[schema(value_type = Vec<u64>)]
    pub employee_ids: Vec<EmployeeId>,
    #[schema(value_type = u64)]
    pub next_employee_id: EmployeeId,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub presigned_url: String,
    pub s3_key: String,
    pub bucket: String,
    pub expires: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResponse {
    pub success: bool,
    pub file_id: String,
    pub s3_key: String,
    pub bucket: String,
    pub upload_method: String,
    pub file_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_key: Option<String>,
}

/// The body of every non-2xx response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// The body of a CORS preflight acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
