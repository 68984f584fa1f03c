//! services/responses_api/src/web/rest.rs
//!
//! Contains the Axum handlers for the local HTTP server and the master definition
//! for the OpenAPI document.
//!
//! Every handler rebuilds the proxy envelope from the HTTP request and hands it to
//! the same `dispatch` the lambda uses, so both front doors behave identically.

use crate::payloads::{
    CompanyDataResponse, CompanyStatusResponse, EmployeeDataResponse, EmployeeListResponse,
    ErrorResponse, LookupRequest, MessageResponse, PresignRequest, PresignResponse, SaveCompanyResponse,
    SaveEmployeeResponse, SaveRequest, SaveResponse, UploadFileRequest, UploadFileResponse,
};
use crate::service::ResponseService;
use crate::web::envelope::{ApiRequest, ApiResponse};
use crate::web::router::dispatch;
use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, MatchedPath, Query, RawPathParams, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use utoipa::OpenApi;

/// Upper bound on request bodies; base64 uploads are the largest.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        save_company_handler,
        save_employee_handler,
        company_status_handler,
        employee_list_handler,
        employee_data_handler,
        submit_handler,
        query_handler,
        preflight_handler,
    ),
    components(
        schemas(
            SaveRequest, LookupRequest, PresignRequest, UploadFileRequest,
            SaveCompanyResponse, SaveEmployeeResponse, SaveResponse,
            CompanyDataResponse, EmployeeDataResponse, CompanyStatusResponse,
            EmployeeListResponse, PresignResponse, UploadFileResponse,
            ErrorResponse, MessageResponse,
        )
    ),
    tags(
        (name = "Questionnaire Responses API", description = "Stores company and employee questionnaire responses.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Envelope Extraction
//=========================================================================================

impl<S> FromRequest<S> for ApiRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let resource = parts
            .extensions
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string());
        let path_parameters = RawPathParams::from_request_parts(&mut parts, state)
            .await
            .ok()
            .map(|params| {
                params
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect::<HashMap<_, _>>()
            });
        let query_string_parameters = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .ok()
            .map(|Query(query)| query)
            .filter(|query| !query.is_empty());

        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response())?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|_| {
            (StatusCode::BAD_REQUEST, "Request body must be UTF-8 text".to_string()).into_response()
        })?;

        Ok(ApiRequest {
            http_method: parts.method.to_string(),
            resource,
            path: Some(parts.uri.path().to_string()),
            path_parameters,
            query_string_parameters,
            body: Some(body).filter(|b| !b.is_empty()),
            is_base64_encoded: false,
        })
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::try_from(name), HeaderValue::try_from(value))
            {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Forwards any request, including unmatched paths, to the router.
pub async fn forward_handler(
    State(service): State<ResponseService>,
    request: ApiRequest,
) -> ApiResponse {
    dispatch(&service, request).await
}

/// Save a company questionnaire.
#[utoipa::path(
    post,
    path = "/save-company",
    request_body = SaveRequest,
    responses(
        (status = 200, description = "Record saved", body = SaveCompanyResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Concurrent writers kept conflicting", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn save_company_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

/// Save an employee questionnaire, assigning a new id when `isNewEmployee` is set.
#[utoipa::path(
    post,
    path = "/save-employee",
    request_body = SaveRequest,
    responses(
        (status = 200, description = "Record saved", body = SaveEmployeeResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Concurrent writers kept conflicting", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn save_employee_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

#[utoipa::path(
    get,
    path = "/company-status/{companyId}",
    params(("companyId" = String, Path, description = "The company identifier.")),
    responses(
        (status = 200, description = "Company progress and employees", body = CompanyStatusResponse),
        (status = 400, description = "Invalid company id", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn company_status_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

#[utoipa::path(
    get,
    path = "/employee-list/{companyId}",
    params(("companyId" = String, Path, description = "The company identifier.")),
    responses(
        (status = 200, description = "Employee ids of the company", body = EmployeeListResponse),
        (status = 400, description = "Invalid company id", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn employee_list_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

#[utoipa::path(
    get,
    path = "/employee-data/{companyId}/{employeeId}",
    params(
        ("companyId" = String, Path, description = "The company identifier."),
        ("employeeId" = u64, Path, description = "The employee identifier.")
    ),
    responses(
        (status = 200, description = "The employee record, or `found: false`", body = EmployeeDataResponse),
        (status = 400, description = "Missing or invalid ids", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn employee_data_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

/// Generic submission.
///
/// A body `action` of `getPresignedUrl`, `uploadFile`, `getCompany` or `getEmployee`
/// selects that operation; otherwise the body is saved according to its `formType`.
#[utoipa::path(
    post,
    path = "/",
    request_body = SaveRequest,
    responses(
        (status = 200, description = "Saved record or action result", body = SaveResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 404, description = "Unknown action", body = ErrorResponse),
        (status = 409, description = "Concurrent writers kept conflicting", body = ErrorResponse),
        (status = 500, description = "Internal server error or malformed JSON", body = ErrorResponse)
    )
)]
pub async fn submit_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

/// Query-style reads: `action=getCompany|getEmployee`, otherwise the company status.
#[utoipa::path(
    get,
    path = "/",
    params(
        ("action" = Option<String>, Query, description = "`getCompany` or `getEmployee`."),
        ("companyId" = String, Query, description = "The company identifier."),
        ("employeeId" = Option<u64>, Query, description = "Required for `getEmployee`.")
    ),
    responses(
        (status = 200, description = "Record or status", body = CompanyDataResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn query_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}

/// CORS preflight; never touches storage.
#[utoipa::path(
    options,
    path = "/",
    responses((status = 200, description = "Preflight acknowledged", body = MessageResponse))
)]
pub async fn preflight_handler(state: State<ResponseService>, request: ApiRequest) -> ApiResponse {
    forward_handler(state, request).await
}
