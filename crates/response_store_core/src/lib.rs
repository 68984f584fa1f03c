pub mod domain;
pub mod keys;
pub mod ports;

pub use domain::{
    completion_percentage, is_answered, CompanyRecord, CompletionPolicy, CompletionSignals,
    CompletionState, EmployeeId, EmployeeRecord, FileMetadataRecord, FileUploadMetadata, FormType,
    Responses, StatusLabel,
};
pub use keys::{check_company_id, next_employee_id, InvalidCompanyId, KeyScheme};
pub use ports::{
    Lookup, NewObject, ObjectStore, PortError, PortResult, StoredObject, WriteCondition,
};
