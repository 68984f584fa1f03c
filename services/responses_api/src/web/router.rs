//! services/responses_api/src/web/router.rs
//!
//! Maps a proxy request onto a service operation.
//!
//! Precedence: `OPTIONS` preflight, then a body `action`, then the named sub-paths,
//! then the generic method-based fallback.

use crate::error::ApiError;
use crate::payloads::{LookupRequest, MessageResponse};
use crate::service::ResponseService;
use crate::web::envelope::{ApiRequest, ApiResponse};
use response_store_core::domain::flexible_id;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Operations selected by an `action` field in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyAction {
    GetPresignedUrl,
    UploadFile,
    GetCompany,
    GetEmployee,
}

impl BodyAction {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "getPresignedUrl" => Some(BodyAction::GetPresignedUrl),
            "uploadFile" => Some(BodyAction::UploadFile),
            "getCompany" => Some(BodyAction::GetCompany),
            "getEmployee" => Some(BodyAction::GetEmployee),
            _ => None,
        }
    }
}

/// The named sub-paths and the segment that introduces each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamedRoute {
    SaveCompany,
    SaveEmployee,
    CompanyStatus,
    EmployeeList,
    EmployeeData,
}

impl NamedRoute {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "save-company" => Some(NamedRoute::SaveCompany),
            "save-employee" => Some(NamedRoute::SaveEmployee),
            "company-status" => Some(NamedRoute::CompanyStatus),
            "employee-list" => Some(NamedRoute::EmployeeList),
            "employee-data" => Some(NamedRoute::EmployeeData),
            _ => None,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            NamedRoute::SaveCompany | NamedRoute::SaveEmployee => "POST",
            _ => "GET",
        }
    }
}

/// Handles one request end to end. Never fails: errors become error envelopes.
pub async fn dispatch(service: &ResponseService, request: ApiRequest) -> ApiResponse {
    debug!("Received event: {:?}", request);
    match route(service, &request).await {
        Ok(response) => response,
        Err(err) => ApiResponse::from_error(&err),
    }
}

async fn route(service: &ResponseService, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let method = request.http_method.to_ascii_uppercase();
    if method == "OPTIONS" {
        return Ok(ok(&MessageResponse {
            message: "CORS preflight".to_string(),
        }));
    }

    let body = parse_body(request)?;

    if let Some(action) = body.get("action").and_then(Value::as_str) {
        let action = BodyAction::parse(action)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown action: {}", action)))?;
        info!("Dispatching body action {:?}", action);
        return match action {
            BodyAction::GetPresignedUrl => {
                Ok(ok(&service.presign_upload(from_body(body)?).await?))
            }
            BodyAction::UploadFile => Ok(ok(&service.upload_file(from_body(body)?).await?)),
            BodyAction::GetCompany => Ok(ok(&service.get_company(from_body(body)?).await?)),
            BodyAction::GetEmployee => Ok(ok(&service.get_employee(from_body(body)?).await?)),
        };
    }

    if let Some((named, params)) = named_route(request) {
        if method != named.method() {
            return Err(ApiError::MethodNotAllowed);
        }
        info!("Dispatching {:?}", named);
        let company_id = request
            .path_parameter("companyId")
            .or_else(|| params.first().copied());
        return match named {
            NamedRoute::SaveCompany => Ok(ok(&service.save_company(from_body(body)?).await?)),
            NamedRoute::SaveEmployee => Ok(ok(&service.save_employee(from_body(body)?).await?)),
            NamedRoute::CompanyStatus => Ok(ok(&service.company_status(company_id).await?)),
            NamedRoute::EmployeeList => Ok(ok(&service.list_employees(company_id).await?)),
            NamedRoute::EmployeeData => {
                let employee_id = request
                    .path_parameter("employeeId")
                    .or_else(|| params.get(1).copied());
                let lookup = lookup(company_id, employee_id)?;
                Ok(ok(&service.get_employee(lookup).await?))
            }
        };
    }

    match method.as_str() {
        "POST" => Ok(ok(&service.save(from_body(body)?).await?)),
        "GET" => {
            let company_id = request.query_parameter("companyId");
            match request.query_parameter("action") {
                Some("getCompany") => {
                    let lookup = lookup(company_id, None)?;
                    Ok(ok(&service.get_company(lookup).await?))
                }
                Some("getEmployee") => {
                    let lookup = lookup(company_id, request.query_parameter("employeeId"))?;
                    Ok(ok(&service.get_employee(lookup).await?))
                }
                _ => Ok(ok(&service.company_status(company_id).await?)),
            }
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}

fn ok<T: Serialize>(payload: &T) -> ApiResponse {
    ApiResponse::json(200, payload)
}

/// The JSON body as an object; an absent body reads as `{}`.
fn parse_body(request: &ApiRequest) -> Result<Map<String, Value>, ApiError> {
    match request.body_text()? {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str(&text).map_err(ApiError::MalformedBody)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            _ => Err(ApiError::Validation("Request body must be a JSON object".to_string())),
        },
    }
}

fn from_body<T: DeserializeOwned>(body: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| ApiError::Validation(e.to_string()))
}

fn lookup(company_id: Option<&str>, employee_id: Option<&str>) -> Result<LookupRequest, ApiError> {
    let employee_id = employee_id
        .filter(|raw| !raw.is_empty())
        .map(flexible_id::parse)
        .transpose()
        .map_err(ApiError::Validation)?;
    Ok(LookupRequest {
        company_id: company_id.map(str::to_string),
        employee_id,
    })
}

/// Finds a named sub-path in the route template or raw path, with the raw path
/// segments that follow it.
fn named_route(request: &ApiRequest) -> Option<(NamedRoute, Vec<&str>)> {
    let template = request.resource.as_deref().or(request.path.as_deref())?;
    let named = segments(template).find_map(NamedRoute::from_segment)?;

    let params = request
        .path
        .as_deref()
        .map(|path| {
            segments(path)
                .skip_while(|segment| NamedRoute::from_segment(segment) != Some(named))
                .skip(1)
                .collect()
        })
        .unwrap_or_default();
    Some((named, params))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
