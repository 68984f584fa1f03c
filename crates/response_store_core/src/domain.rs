//! crates/response_store_core/src/domain.rs
//!
//! Defines the questionnaire records and the completion model.
//! These structs describe the JSON documents kept in object storage; the rules that
//! derive completion fields from a `responses` mapping live here as pure functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Question identifier -> answer value, exactly as submitted by the form.
pub type Responses = Map<String, Value>;

/// Employee identifiers are assigned per company, starting at 0.
pub type EmployeeId = u64;

//=========================================================================================
// Form Type and Status Label
//=========================================================================================

/// Which questionnaire a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Company,
    Employee,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Company => "company",
            FormType::Employee => "employee",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(FormType::Company),
            "employee" => Ok(FormType::Employee),
            other => Err(format!("unknown formType '{}'", other)),
        }
    }
}

fn company_form() -> FormType {
    FormType::Company
}

fn employee_form() -> FormType {
    FormType::Employee
}

/// The tri-state label reported by the company status summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusLabel {
    Completed,
    InProgress,
    NotStarted,
}

//=========================================================================================
// Completion Model
//=========================================================================================

/// Whether a single answer counts towards the completion percentage.
///
/// Strings must contain non-whitespace text and arrays and objects must be non-empty.
/// `null`, `false` and zero never count.
pub fn is_answered(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    }
}

/// `floor(answered * 100 / total)`, or 0 for an empty mapping.
pub fn completion_percentage(responses: &Responses) -> u8 {
    let total = responses.len();
    if total == 0 {
        return 0;
    }
    let answered = responses.values().filter(|v| is_answered(v)).count();
    // answered <= total, so the quotient is at most 100.
    (answered * 100 / total) as u8
}

/// Completion hints carried by a save request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionSignals {
    pub complete_audit: bool,
    pub force_complete: bool,
    pub prevent_auto_complete: bool,
}

/// The derived completion fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionState {
    pub percentage: u8,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CompletionState {
    /// The state of a record that does not exist yet.
    pub fn not_started() -> Self {
        Self {
            percentage: 0,
            completed: false,
            completed_at: None,
        }
    }

    /// Partially answered and not yet completed.
    pub fn in_progress(&self) -> bool {
        !self.completed && self.percentage > 0 && self.percentage < 100
    }

    pub fn status(&self) -> StatusLabel {
        if self.completed {
            StatusLabel::Completed
        } else if self.percentage > 0 {
            StatusLabel::InProgress
        } else {
            StatusLabel::NotStarted
        }
    }
}

/// Decides when a record becomes completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionPolicy {
    /// Mark records completed as soon as every answer is filled in.
    pub auto_complete: bool,
}

impl CompletionPolicy {
    /// Recomputes the completion state from the full `responses` mapping.
    ///
    /// Completion is sticky: once a record is completed it keeps its flag and its
    /// original `completed_at`, whatever the new percentage is.
    pub fn resolve(
        &self,
        responses: &Responses,
        signals: CompletionSignals,
        previous: Option<CompletionState>,
        now: DateTime<Utc>,
    ) -> CompletionState {
        let percentage = completion_percentage(responses);

        if let Some(prev) = previous.filter(|p| p.completed) {
            return CompletionState {
                percentage,
                completed: true,
                completed_at: prev.completed_at.or(Some(now)),
            };
        }

        let auto = self.auto_complete && percentage == 100 && !signals.prevent_auto_complete;
        let completed = signals.complete_audit || signals.force_complete || auto;

        CompletionState {
            percentage,
            completed,
            completed_at: completed.then_some(now),
        }
    }
}

//=========================================================================================
// Stored Records
//=========================================================================================

/// File metadata attached to a record, keyed by the question it answers.
///
/// Only `questionId` is interpreted; every other field the client sends is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadMetadata {
    pub question_id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// The company questionnaire document, one per company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub company_id: String,
    #[serde(default = "company_form")]
    pub form_type: FormType,
    #[serde(default, with = "timestamp::option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub responses: Responses,
    #[serde(default, deserialize_with = "percentage::deserialize")]
    pub completion_percentage: u8,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default, alias = "completed")]
    pub explicitly_completed: bool,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_uploads: BTreeMap<String, FileUploadMetadata>,
}

impl CompanyRecord {
    /// Builds the next version of a company record from the previously stored one.
    ///
    /// `timestamp` and earlier file uploads carry over, everything else is replaced.
    pub fn merged(
        previous: Option<&CompanyRecord>,
        company_id: &str,
        responses: Responses,
        completion: CompletionState,
        upload: Option<FileUploadMetadata>,
        now: DateTime<Utc>,
    ) -> Self {
        let created = previous.map(|p| p.created_at()).unwrap_or(now);
        let file_uploads = merge_uploads(previous.map(|p| &p.file_uploads), upload);

        Self {
            company_id: company_id.to_string(),
            form_type: FormType::Company,
            timestamp: Some(created),
            last_modified: now,
            responses,
            completion_percentage: completion.percentage,
            in_progress: completion.in_progress(),
            explicitly_completed: completion.completed,
            completed_at: completion.completed_at,
            file_uploads,
        }
    }

    /// Creation time; records written without one fall back to `lastModified`.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.last_modified)
    }

    pub fn completion(&self) -> CompletionState {
        CompletionState {
            percentage: self.completion_percentage,
            completed: self.explicitly_completed,
            completed_at: self.completed_at,
        }
    }
}

/// One employee's questionnaire document, scoped to a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub company_id: String,
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub employee_id: EmployeeId,
    #[serde(default = "employee_form")]
    pub form_type: FormType,
    #[serde(default, with = "timestamp::option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub responses: Responses,
    #[serde(default, deserialize_with = "percentage::deserialize")]
    pub completion_percentage: u8,
    #[serde(default, alias = "completed")]
    pub explicitly_completed: bool,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_uploads: BTreeMap<String, FileUploadMetadata>,
}

impl EmployeeRecord {
    /// Builds the next version of an employee record from the previously stored one.
    pub fn merged(
        previous: Option<&EmployeeRecord>,
        company_id: &str,
        employee_id: EmployeeId,
        responses: Responses,
        completion: CompletionState,
        upload: Option<FileUploadMetadata>,
        now: DateTime<Utc>,
    ) -> Self {
        let created = previous.map(|p| p.created_at()).unwrap_or(now);
        let file_uploads = merge_uploads(previous.map(|p| &p.file_uploads), upload);

        Self {
            company_id: company_id.to_string(),
            employee_id,
            form_type: FormType::Employee,
            timestamp: Some(created),
            last_modified: now,
            responses,
            completion_percentage: completion.percentage,
            explicitly_completed: completion.completed,
            completed_at: completion.completed_at,
            file_uploads,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.last_modified)
    }

    pub fn completion(&self) -> CompletionState {
        CompletionState {
            percentage: self.completion_percentage,
            completed: self.explicitly_completed,
            completed_at: self.completed_at,
        }
    }
}

fn merge_uploads(
    previous: Option<&BTreeMap<String, FileUploadMetadata>>,
    upload: Option<FileUploadMetadata>,
) -> BTreeMap<String, FileUploadMetadata> {
    let mut uploads = previous.cloned().unwrap_or_default();
    if let Some(upload) = upload {
        uploads.insert(upload.question_id.clone(), upload);
    }
    uploads
}

/// An entry in the upload-metadata registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadataRecord {
    pub upload_id: Uuid,
    pub company_id: String,
    #[serde(default, deserialize_with = "flexible_id::option::deserialize")]
    pub employee_id: Option<EmployeeId>,
    pub question_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(rename = "s3Key")]
    pub storage_key: String,
    #[serde(rename = "s3Bucket")]
    pub bucket: String,
    #[serde(with = "timestamp")]
    pub upload_timestamp: DateTime<Utc>,
    pub question_text: String,
    pub form_type: FormType,
}

//=========================================================================================
// Lenient Decoding for Older Records
//=========================================================================================

/// RFC 3339 on write; on read also accepts the zone-less ISO form older writers used.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}

/// Accepts integer or fractional percentages and truncates them into 0..=100.
mod percentage {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct PercentageVisitor;

    impl<'de> Visitor<'de> for PercentageVisitor {
        type Value = u8;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number between 0 and 100")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u8, E> {
            Ok(v.min(100) as u8)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u8, E> {
            Ok(v.clamp(0, 100) as u8)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u8, E> {
            if v.is_nan() {
                return Ok(0);
            }
            Ok(v.clamp(0.0, 100.0) as u8)
        }

        fn visit_unit<E: de::Error>(self) -> Result<u8, E> {
            Ok(0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        deserializer.deserialize_any(PercentageVisitor)
    }
}

/// Employee ids as clients send them: `3` or `"3"`.
///
/// Older handlers stored the id exactly as posted, so records can hold either form.
pub mod flexible_id {
    use super::EmployeeId;
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = Option<EmployeeId>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer employee id")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            EmployeeId::try_from(v)
                .map(Some)
                .map_err(|_| E::custom(format!("employeeId must not be negative, got {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse(v).map(Some).map_err(E::custom)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(IdVisitor)
        }
    }

    pub fn parse(raw: &str) -> Result<EmployeeId, String> {
        raw.trim()
            .parse::<EmployeeId>()
            .map_err(|_| format!("employeeId must be a non-negative integer, got '{}'", raw))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EmployeeId, D::Error> {
        d.deserialize_any(IdVisitor)?
            .ok_or_else(|| de::Error::custom("employeeId must not be null"))
    }

    /// Same, for fields where `null` or absence means no id.
    pub mod option {
        use super::{EmployeeId, IdVisitor};
        use serde::de::Deserializer;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<EmployeeId>, D::Error> {
            d.deserialize_option(IdVisitor)
        }
    }
}
