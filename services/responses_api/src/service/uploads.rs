//! services/responses_api/src/service/uploads.rs
//!
//! File attachments: presigned URLs for direct uploads, the base64 fallback path,
//! and the opt-in upload-metadata registry.

use super::{required_company_id, ResponseService};
use crate::error::ApiError;
use crate::payloads::{PresignRequest, PresignResponse, UploadFileRequest, UploadFileResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use response_store_core::{
    EmployeeId, FileMetadataRecord, FormType, KeyScheme, NewObject, WriteCondition,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What the registry needs to know about an uploaded file.
#[derive(Debug, Clone)]
pub struct UploadRegistration {
    pub company_id: String,
    pub employee_id: Option<EmployeeId>,
    pub question_id: String,
    pub question_text: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub storage_key: String,
    pub bucket: Option<String>,
}

impl ResponseService {
    pub async fn presign_upload(&self, request: PresignRequest) -> Result<PresignResponse, ApiError> {
        let (file_name, content_type, s3_key) = match (
            request.file_name.as_deref().filter(|v| !v.is_empty()),
            request.content_type.as_deref().filter(|v| !v.is_empty()),
            request.s3_key.as_deref().filter(|v| !v.is_empty()),
        ) {
            (Some(file_name), Some(content_type), Some(s3_key)) => (file_name, content_type, s3_key),
            _ => return Err(ApiError::missing(&["fileName", "contentType", "s3Key"])),
        };
        let bucket = self.target_bucket(request.bucket.as_deref())?;
        self.check_upload_key(s3_key)?;
        if let Some(method) = request.method.as_deref() {
            if !method.eq_ignore_ascii_case("PUT") {
                return Err(ApiError::Validation(format!(
                    "Unsupported presign method '{}'; only PUT is allowed",
                    method
                )));
            }
        }
        let expires = match request.expires {
            Some(0) => return Err(ApiError::Validation("expires must be positive".to_string())),
            Some(secs) => secs.min(self.settings.presign_max_expiry_secs),
            None => self.settings.presign_default_expiry_secs,
        };

        let presigned_url = self
            .store
            .presign_put(s3_key, content_type, Duration::from_secs(expires))
            .await?;
        info!("Generated presigned URL for {} ({}s): {}", file_name, expires, s3_key);

        Ok(PresignResponse {
            presigned_url,
            s3_key: s3_key.to_string(),
            bucket,
            expires,
        })
    }

    /// Decodes a base64 payload and writes it straight to storage.
    pub async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadFileResponse, ApiError> {
        let (file_data, file_name, s3_key) = match (
            request.file_data.as_deref().filter(|v| !v.is_empty()),
            request.file_name.as_deref().filter(|v| !v.is_empty()),
            request.s3_key.as_deref().filter(|v| !v.is_empty()),
        ) {
            (Some(file_data), Some(file_name), Some(s3_key)) => (file_data, file_name, s3_key),
            _ => return Err(ApiError::missing(&["fileData", "fileName", "s3Key"])),
        };
        let bucket = self.target_bucket(request.bucket.as_deref())?;
        self.check_upload_key(s3_key)?;
        let company_id = request.company_id.as_deref().filter(|v| !v.is_empty());
        let question_id = request.question_id.as_deref().filter(|v| !v.is_empty());
        let registration_ids = match (request.register_metadata, company_id, question_id) {
            (false, _, _) => None,
            (true, Some(company_id), Some(question_id)) => {
                Some((required_company_id(Some(company_id))?, question_id))
            }
            (true, _, _) => return Err(ApiError::missing(&["companyId", "questionId"])),
        };

        let file_bytes = STANDARD
            .decode(file_data.trim())
            .map_err(|e| ApiError::Validation(format!("fileData is not valid base64: {}", e)))?;
        let file_size = file_bytes.len() as u64;
        let content_type = request
            .content_type
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let uploaded_at = Utc::now();

        let mut metadata = extra_metadata(&request.metadata);
        metadata.insert("original-filename".to_string(), file_name.to_string());
        metadata.insert("company-id".to_string(), company_id.unwrap_or_default().to_string());
        metadata.insert(
            "employee-id".to_string(),
            request.employee_id.map(|id| id.to_string()).unwrap_or_default(),
        );
        metadata.insert("question-id".to_string(), question_id.unwrap_or_default().to_string());
        metadata.insert(
            "upload-timestamp".to_string(),
            uploaded_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        metadata.insert("upload-method".to_string(), "lambda-fallback".to_string());

        let object = NewObject {
            body: Bytes::from(file_bytes),
            content_type: content_type.to_string(),
            metadata,
        };
        self.store.put(s3_key, object, WriteCondition::Unconditional).await?;
        info!("File uploaded successfully: {} ({} bytes)", s3_key, file_size);

        let registered = match registration_ids {
            Some((company_id, question_id)) => Some(
                self.register_upload(UploadRegistration {
                    company_id: company_id.to_string(),
                    employee_id: request.employee_id,
                    question_id: question_id.to_string(),
                    question_text: request.question_text.clone(),
                    file_name: file_name.to_string(),
                    file_size,
                    file_type: content_type.to_string(),
                    storage_key: s3_key.to_string(),
                    bucket: Some(bucket.clone()),
                })
                .await?,
            ),
            None => None,
        };

        let file_id = Uuid::new_v4().simple().to_string();
        Ok(UploadFileResponse {
            success: true,
            file_id: format!("file_{}", &file_id[..12]),
            s3_key: s3_key.to_string(),
            bucket,
            upload_method: "lambda".to_string(),
            file_name: file_name.to_string(),
            file_size,
            uploaded_at,
            upload_id: registered.as_ref().map(|(record, _)| record.upload_id),
            metadata_key: registered.map(|(_, key)| key),
        })
    }

    /// Writes a registry entry for an upload and returns it with its key.
    pub async fn register_upload(
        &self,
        registration: UploadRegistration,
    ) -> Result<(FileMetadataRecord, String), ApiError> {
        let company_id = required_company_id(Some(registration.company_id.as_str()))?;
        let record = FileMetadataRecord {
            upload_id: Uuid::new_v4(),
            company_id: company_id.to_string(),
            employee_id: registration.employee_id,
            question_id: registration.question_id,
            file_name: registration.file_name,
            file_size: registration.file_size,
            file_type: registration.file_type,
            storage_key: registration.storage_key,
            bucket: registration
                .bucket
                .unwrap_or_else(|| self.bucket().to_string()),
            upload_timestamp: Utc::now(),
            question_text: registration
                .question_text
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| "Unknown Question".to_string()),
            form_type: if registration.employee_id.is_some() {
                FormType::Employee
            } else {
                FormType::Company
            },
        };

        let key = KeyScheme::upload_metadata_key(company_id, record.upload_id);
        self.write_json(&key, &record, WriteCondition::IfAbsent).await?;
        info!("Saved file metadata: {}", key);
        Ok((record, key))
    }

    /// The configured bucket; a request may name it but not redirect elsewhere.
    fn target_bucket(&self, requested: Option<&str>) -> Result<String, ApiError> {
        match requested.filter(|b| !b.is_empty()) {
            Some(bucket) if bucket != self.bucket() => Err(ApiError::Validation(format!(
                "Bucket '{}' is not served by this service",
                bucket
            ))),
            _ => Ok(self.bucket().to_string()),
        }
    }

    fn check_upload_key(&self, key: &str) -> Result<(), ApiError> {
        if self.settings.key_scheme.is_reserved_key(key) {
            return Err(ApiError::Validation(format!(
                "s3Key '{}' is reserved for questionnaire records",
                key
            )));
        }
        Ok(())
    }
}

/// Caller-supplied object metadata; non-string values keep their JSON text.
fn extra_metadata(extra: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    extra
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}
