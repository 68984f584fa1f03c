//! crates/response_store_core/src/keys.rs
//!
//! Maps companies and employees to object-storage keys.
//!
//! Two layouts exist in deployed buckets. `Namespaced` groups everything under the
//! company id and is the default; `Legacy` is kept for buckets written by the older
//! handler. The upload-metadata registry uses the same prefix under both.

use crate::domain::EmployeeId;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const UPLOAD_METADATA_PREFIX: &str = "uploads/metadata/";

/// Error for identifiers that cannot be embedded in a storage key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid companyId '{0}': must be non-empty and must not contain '/'")]
pub struct InvalidCompanyId(pub String);

/// Rejects company ids that would escape their key namespace.
pub fn check_company_id(company_id: &str) -> Result<&str, InvalidCompanyId> {
    if company_id.trim().is_empty()
        || company_id.contains('/')
        || company_id == "."
        || company_id == ".."
    {
        return Err(InvalidCompanyId(company_id.to_string()));
    }
    Ok(company_id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyScheme {
    /// `{companyId}/company.json` and `{companyId}/employee_{employeeId}.json`.
    #[default]
    Namespaced,
    /// `company-responses/{companyId}.json` and `employee-responses/{companyId}/{employeeId}.json`.
    Legacy,
}

impl KeyScheme {
    pub fn company_key(&self, company_id: &str) -> String {
        match self {
            KeyScheme::Namespaced => format!("{}/company.json", company_id),
            KeyScheme::Legacy => format!("company-responses/{}.json", company_id),
        }
    }

    pub fn employee_key(&self, company_id: &str, employee_id: EmployeeId) -> String {
        format!("{}{}.json", self.employee_prefix(company_id), employee_id)
    }

    /// The listing prefix shared by every employee record of a company.
    pub fn employee_prefix(&self, company_id: &str) -> String {
        match self {
            KeyScheme::Namespaced => format!("{}/employee_", company_id),
            KeyScheme::Legacy => format!("employee-responses/{}/", company_id),
        }
    }

    /// Extracts the employee id from a listed key, or `None` if the name is malformed.
    pub fn parse_employee_id(&self, company_id: &str, key: &str) -> Option<EmployeeId> {
        let prefix = self.employee_prefix(company_id);
        let digits = key.strip_prefix(prefix.as_str())?.strip_suffix(".json")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Sorted, de-duplicated employee ids found among `keys`.
    pub fn employee_ids<'a, I>(&self, company_id: &str, keys: I) -> Vec<EmployeeId>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut ids: Vec<EmployeeId> = keys
            .into_iter()
            .filter_map(|key| self.parse_employee_id(company_id, key))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Whether `key` addresses a response record or the upload registry under this scheme.
    pub fn is_reserved_key(&self, key: &str) -> bool {
        if key.starts_with(UPLOAD_METADATA_PREFIX) {
            return true;
        }
        match self {
            KeyScheme::Namespaced => match key.split_once('/') {
                Some((company_id, rest)) => {
                    rest == "company.json" || self.parse_employee_id(company_id, key).is_some()
                }
                None => false,
            },
            KeyScheme::Legacy => {
                key.starts_with("company-responses/") || key.starts_with("employee-responses/")
            }
        }
    }

    pub fn upload_metadata_key(company_id: &str, upload_id: Uuid) -> String {
        format!("{}{}/upload-{}.json", UPLOAD_METADATA_PREFIX, company_id, upload_id)
    }
}

/// One past the highest id in use, or 0 when no employee exists yet.
pub fn next_employee_id(ids: &[EmployeeId]) -> EmployeeId {
    ids.iter().max().map_or(0, |max| max + 1)
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScheme::Namespaced => f.write_str("namespaced"),
            KeyScheme::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for KeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "namespaced" | "a" => Ok(KeyScheme::Namespaced),
            "legacy" | "b" => Ok(KeyScheme::Legacy),
            other => Err(format!("'{}' is not a key scheme (namespaced | legacy)", other)),
        }
    }
}
