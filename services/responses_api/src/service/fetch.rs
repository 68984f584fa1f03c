//! services/responses_api/src/service/fetch.rs
//!
//! Read-only operations. A missing record is a normal answer here, never an error.

use super::{required_company_id, ResponseService};
use crate::error::ApiError;
use crate::payloads::{
    CompanyDataResponse, CompanyFoundResponse, CompanyStatusResponse, EmployeeDataResponse,
    EmployeeFoundResponse, EmployeeListResponse, LookupRequest, NotFoundResponse,
};
use response_store_core::{next_employee_id, CompanyRecord, CompletionState, EmployeeRecord};
use tracing::info;

impl ResponseService {
    pub async fn get_company(&self, request: LookupRequest) -> Result<CompanyDataResponse, ApiError> {
        let company_id = required_company_id(request.company_id.as_deref())?;
        let key = self.settings.key_scheme.company_key(company_id);

        let (record, _) = self.load::<CompanyRecord>(&key).await?;
        let Some(record) = record else {
            info!("No company data found for company {}", company_id);
            return Ok(CompanyDataResponse::Missing(NotFoundResponse::new(format!(
                "No company data found for company {}",
                company_id
            ))));
        };

        info!("Retrieved company data for company {}", company_id);
        Ok(CompanyDataResponse::Found(CompanyFoundResponse {
            found: true,
            responses: record.responses.clone(),
            last_modified: record.last_modified,
            completion_percentage: record.completion_percentage,
            in_progress: record.completion().in_progress(),
            explicitly_completed: record.explicitly_completed,
            company_data: record,
        }))
    }

    pub async fn get_employee(&self, request: LookupRequest) -> Result<EmployeeDataResponse, ApiError> {
        let (company_id, employee_id) = match (request.company_id.as_deref(), request.employee_id) {
            (Some(company_id), Some(employee_id)) if !company_id.is_empty() => {
                (required_company_id(Some(company_id))?, employee_id)
            }
            _ => return Err(ApiError::missing(&["companyId", "employeeId"])),
        };
        let key = self.settings.key_scheme.employee_key(company_id, employee_id);

        let (record, _) = self.load::<EmployeeRecord>(&key).await?;
        let Some(record) = record else {
            info!("No employee {} found for company {}", employee_id, company_id);
            return Ok(EmployeeDataResponse::Missing(NotFoundResponse::new(format!(
                "No employee found with ID {} for company {}",
                employee_id, company_id
            ))));
        };

        info!("Retrieved employee {} data for company {}", employee_id, company_id);
        Ok(EmployeeDataResponse::Found(EmployeeFoundResponse {
            found: true,
            responses: record.responses.clone(),
            last_modified: record.last_modified,
            employee_id,
            employee_data: record,
        }))
    }

    /// Company progress plus its employees; defaults apply when nothing is stored yet.
    pub async fn company_status(&self, company_id: Option<&str>) -> Result<CompanyStatusResponse, ApiError> {
        let company_id = required_company_id(company_id)?;
        let key = self.settings.key_scheme.company_key(company_id);

        let (record, _) = self.load::<CompanyRecord>(&key).await?;
        let completion = record
            .as_ref()
            .map(CompanyRecord::completion)
            .unwrap_or_else(CompletionState::not_started);
        let employee_ids = self.employee_ids(company_id).await?;

        Ok(CompanyStatusResponse {
            company_id: company_id.to_string(),
            status: completion.status(),
            company_completed: completion.completed,
            company_in_progress: completion.in_progress(),
            completion_percentage: completion.percentage,
            last_modified: record.as_ref().map(|r| r.last_modified),
            employee_count: employee_ids.len(),
            next_employee_id: next_employee_id(&employee_ids),
            employee_ids,
        })
    }

    pub async fn list_employees(&self, company_id: Option<&str>) -> Result<EmployeeListResponse, ApiError> {
        let company_id = required_company_id(company_id)?;
        let employee_ids = self.employee_ids(company_id).await?;

        Ok(EmployeeListResponse {
            company_id: company_id.to_string(),
            employee_count: employee_ids.len(),
            next_employee_id: next_employee_id(&employee_ids),
            employee_ids,
        })
    }
}
