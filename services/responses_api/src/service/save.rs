//! services/responses_api/src/service/save.rs
//!
//! Questionnaire submissions for companies and employees.

use super::{required_company_id, ResponseService};
use crate::error::ApiError;
use crate::payloads::{SaveCompanyResponse, SaveEmployeeResponse, SaveRequest, SaveResponse};
use chrono::Utc;
use response_store_core::{
    CompanyRecord, EmployeeId, EmployeeRecord, FormType, Responses, WriteCondition,
};
use tracing::info;

impl ResponseService {
    /// Saves a submission, choosing the record kind from `formType`.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveResponse, ApiError> {
        let form_type = request
            .form_type
            .as_deref()
            .ok_or_else(|| ApiError::missing(&["formType"]))?
            .parse::<FormType>()
            .map_err(|e| ApiError::Validation(format!("{}; expected 'company' or 'employee'", e)))?;

        match form_type {
            FormType::Company => self.save_company(request).await.map(SaveResponse::Company),
            FormType::Employee => self.save_employee(request).await.map(SaveResponse::Employee),
        }
    }

    pub async fn save_company(&self, request: SaveRequest) -> Result<SaveCompanyResponse, ApiError> {
        let company_id = required_company_id(request.company_id.as_deref())?;
        let responses = request
            .responses
            .as_ref()
            .ok_or_else(|| ApiError::missing(&["responses"]))?;
        let key = self.settings.key_scheme.company_key(company_id);
        info!("Saving company response for company {}", company_id);

        let mut attempt = 1;
        let record = loop {
            match self.write_company(&key, company_id, responses, &request).await {
                Err(err) if self.retry_after(&err, attempt) => attempt += 1,
                result => break result?,
            }
        };

        info!(
            "Company {} saved at {}% (completed: {})",
            company_id, record.completion_percentage, record.explicitly_completed
        );
        Ok(SaveCompanyResponse {
            success: true,
            message: "Company response saved successfully".to_string(),
            filename: key,
            company_id: record.company_id,
            completion_percentage: record.completion_percentage,
            in_progress: record.in_progress,
            explicitly_completed: record.explicitly_completed,
            completed_at: record.completed_at,
            last_modified: record.last_modified,
        })
    }

    async fn write_company(
        &self,
        key: &str,
        company_id: &str,
        responses: &Responses,
        request: &SaveRequest,
    ) -> Result<CompanyRecord, ApiError> {
        let (previous, condition) = self.load::<CompanyRecord>(key).await?;
        if previous.is_none() {
            info!("No existing company data for {}, creating new", company_id);
        }

        let now = Utc::now();
        let completion = self.settings.completion.resolve(
            responses,
            request.signals(),
            previous.as_ref().map(CompanyRecord::completion),
            now,
        );
        let record = CompanyRecord::merged(
            previous.as_ref(),
            company_id,
            responses.clone(),
            completion,
            request.file_metadata.clone(),
            now,
        );

        self.write_json(key, &record, condition).await?;
        Ok(record)
    }

    pub async fn save_employee(&self, request: SaveRequest) -> Result<SaveEmployeeResponse, ApiError> {
        let company_id = required_company_id(request.company_id.as_deref())?;
        let responses = request
            .responses
            .as_ref()
            .ok_or_else(|| ApiError::missing(&["responses"]))?;
        let assign_new = match (request.employee_id, request.is_new_employee) {
            (Some(_), _) => false,
            (None, true) => true,
            (None, false) => {
                return Err(ApiError::Validation(
                    "Missing required parameters: employeeId (or isNewEmployee=true)".to_string(),
                ))
            }
        };
        info!("Saving employee response for company {}", company_id);

        let mut attempt = 1;
        let record = loop {
            let result = match request.employee_id {
                Some(employee_id) if !assign_new => {
                    self.write_employee(company_id, employee_id, responses, &request, false)
                        .await
                }
                _ => self.write_new_employee(company_id, responses, &request).await,
            };
            match result {
                Err(err) if self.retry_after(&err, attempt) => attempt += 1,
                result => break result?,
            }
        };

        let key = self
            .settings
            .key_scheme
            .employee_key(company_id, record.employee_id);
        Ok(SaveEmployeeResponse {
            success: true,
            message: "Employee response saved successfully".to_string(),
            filename: key,
            company_id: record.company_id,
            employee_id: record.employee_id,
            completion_percentage: record.completion_percentage,
            explicitly_completed: record.explicitly_completed,
            completed_at: record.completed_at,
            last_modified: record.last_modified,
        })
    }

    /// Claims the next free id with a create-only write; a concurrent claim surfaces as a conflict.
    async fn write_new_employee(
        &self,
        company_id: &str,
        responses: &Responses,
        request: &SaveRequest,
    ) -> Result<EmployeeRecord, ApiError> {
        let employee_id = self.next_employee_id(company_id).await?;
        info!("Assigned new employee ID {} for company {}", employee_id, company_id);
        self.write_employee(company_id, employee_id, responses, request, true)
            .await
    }

    async fn write_employee(
        &self,
        company_id: &str,
        employee_id: EmployeeId,
        responses: &Responses,
        request: &SaveRequest,
        is_new: bool,
    ) -> Result<EmployeeRecord, ApiError> {
        let key = self.settings.key_scheme.employee_key(company_id, employee_id);
        let (previous, condition) = if is_new {
            (None, WriteCondition::IfAbsent)
        } else {
            self.load::<EmployeeRecord>(&key).await?
        };
        if previous.is_none() {
            info!("Creating new employee record {}", key);
        }

        let now = Utc::now();
        let completion = self.settings.completion.resolve(
            responses,
            request.signals(),
            previous.as_ref().map(EmployeeRecord::completion),
            now,
        );
        let record = EmployeeRecord::merged(
            previous.as_ref(),
            company_id,
            employee_id,
            responses.clone(),
            completion,
            request.file_metadata.clone(),
            now,
        );

        self.write_json(&key, &record, condition).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{service, service_with};
    use super::*;
    use crate::config::ServiceSettings;
    use response_store_core::{CompletionPolicy, PortError};
    use serde_json::json;

    fn request(value: serde_json::Value) -> SaveRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn company_save_derives_completion() {
        let (service, store) = service();
        let saved = service
            .save_company(request(json!({
                "companyId": "C1",
                "responses": {"q1": "a", "q2": ""}
            })))
            .await
            .unwrap();

        assert_eq!(saved.filename, "C1/company.json");
        assert_eq!(saved.completion_percentage, 50);
        assert!(saved.in_progress);
        assert!(!saved.explicitly_completed);
        assert!(store.object("C1/company.json").await.is_some());
    }

    #[tokio::test]
    async fn company_timestamp_survives_resaves() {
        let (service, store) = service();
        let body = json!({"companyId": "C1", "responses": {"q1": "a"}});
        service.save_company(request(body.clone())).await.unwrap();
        let first: CompanyRecord =
            serde_json::from_slice(&store.object("C1/company.json").await.unwrap().0).unwrap();

        service.save_company(request(body)).await.unwrap();
        let second: CompanyRecord =
            serde_json::from_slice(&store.object("C1/company.json").await.unwrap().0).unwrap();

        assert_eq!(first.timestamp, second.timestamp);
        assert!(second.last_modified >= first.last_modified);
    }

    #[tokio::test]
    async fn auto_complete_policy_completes_full_submissions() {
        let (service, _) = service_with(ServiceSettings {
            completion: CompletionPolicy { auto_complete: true },
            ..ServiceSettings::default()
        });
        let saved = service
            .save_company(request(json!({"companyId": "C1", "responses": {"q1": "a"}})))
            .await
            .unwrap();
        assert!(saved.explicitly_completed);
        assert!(saved.completed_at.is_some());
    }

    #[tokio::test]
    async fn new_employees_get_sequential_ids() {
        let (service, _) = service();
        let body = json!({"companyId": "C1", "isNewEmployee": true, "responses": {}});
        assert_eq!(service.save_employee(request(body.clone())).await.unwrap().employee_id, 0);
        assert_eq!(service.save_employee(request(body)).await.unwrap().employee_id, 1);
    }

    #[tokio::test]
    async fn explicit_employee_id_wins_over_new_flag() {
        let (service, store) = service();
        let saved = service
            .save_employee(request(json!({
                "companyId": "C1",
                "employeeId": "7",
                "isNewEmployee": true,
                "responses": {"q1": "x"}
            })))
            .await
            .unwrap();
        assert_eq!(saved.employee_id, 7);
        assert!(store.object("C1/employee_7.json").await.is_some());
    }

    #[tokio::test]
    async fn employee_without_id_or_new_flag_is_rejected() {
        let (service, store) = service();
        let err = service
            .save_employee(request(json!({"companyId": "C1", "responses": {}})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_reported() {
        let (service, store) = service();
        let body = json!({"companyId": "C1", "responses": {"q1": "a"}});

        store.inject_conflicts(2);
        assert!(service.save_company(request(body.clone())).await.is_ok());

        store.inject_conflicts(3);
        let err = service.save_company(request(body)).await.unwrap_err();
        assert!(matches!(err, ApiError::Port(PortError::Conflict(_))));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn save_requires_a_known_form_type() {
        let (service, _) = service();
        let err = service
            .save(request(json!({"companyId": "C1", "formType": "vendor", "responses": {}})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = service
            .save(request(json!({"companyId": "C1", "responses": {}})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameters: formType");
    }
}
