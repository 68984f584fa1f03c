//! End-to-end routing tests: proxy envelopes in, proxy envelopes out, over `MemoryStore`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use responses_api_lib::{
    adapters::MemoryStore,
    config::ServiceSettings,
    service::ResponseService,
    web::{dispatch, ApiRequest, ApiResponse},
};
use response_store_core::KeyScheme;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn setup_with(settings: ServiceSettings) -> (ResponseService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new("responses-test"));
    (ResponseService::new(store.clone(), settings), store)
}

fn setup() -> (ResponseService, Arc<MemoryStore>) {
    setup_with(ServiceSettings::default())
}

fn post(path: &str, body: Value) -> ApiRequest {
    ApiRequest::new("POST", path).with_body(body.to_string())
}

fn body(response: &ApiResponse) -> Value {
    serde_json::from_str(&response.body).expect("response body is JSON")
}

#[tokio::test]
async fn preflight_answers_without_touching_storage() {
    let (service, store) = setup();
    let response = dispatch(&service, ApiRequest::new("OPTIONS", "/save-company")).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(body(&response), json!({"message": "CORS preflight"}));
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    assert_eq!(response.headers["Access-Control-Allow-Headers"], "Content-Type");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn company_save_reports_partial_completion() {
    let (service, _) = setup();
    let response = dispatch(
        &service,
        post("/", json!({"formType": "company", "companyId": "C1", "responses": {"q1": "a", "q2": ""}})),
    )
    .await;

    assert_eq!(response.status_code, 200);
    let saved = body(&response);
    assert_eq!(saved["success"], true);
    assert_eq!(saved["completionPercentage"], 50);
    assert_eq!(saved["inProgress"], true);
    assert_eq!(saved["explicitlyCompleted"], false);
    assert_eq!(saved["filename"], "C1/company.json");
}

#[tokio::test]
async fn saved_company_round_trips_through_fetch() {
    let (service, _) = setup();
    let responses = json!({"q1": "yes", "q2": ["a", "b"], "q3": 4});
    let saved = dispatch(
        &service,
        post("/save-company", json!({"companyId": "C1", "responses": responses})),
    )
    .await;
    let first = body(&saved);

    let fetched = dispatch(
        &service,
        post("/", json!({"action": "getCompany", "companyId": "C1"})),
    )
    .await;
    assert_eq!(fetched.status_code, 200);
    let fetched = body(&fetched);
    assert_eq!(fetched["found"], true);
    assert_eq!(fetched["responses"], responses);
    assert_eq!(fetched["completionPercentage"], 100);
    assert_eq!(fetched["lastModified"], first["lastModified"]);
    let created = fetched["companyData"]["timestamp"].clone();

    dispatch(
        &service,
        post("/save-company", json!({"companyId": "C1", "responses": responses})),
    )
    .await;
    let refetched = dispatch(
        &service,
        ApiRequest::new("GET", "/")
            .with_query("action", "getCompany")
            .with_query("companyId", "C1"),
    )
    .await;
    assert_eq!(body(&refetched)["companyData"]["timestamp"], created);
}

#[tokio::test]
async fn new_employees_are_numbered_from_zero() {
    let (service, store) = setup();
    let request = json!({"formType": "employee", "companyId": "C1", "isNewEmployee": true, "responses": {"q1": "a"}});

    let first = dispatch(&service, post("/", request.clone())).await;
    let second = dispatch(&service, post("/", request)).await;

    assert_eq!(body(&first)["employeeId"], 0);
    assert_eq!(body(&second)["employeeId"], 1);
    let keys = store.keys().await;
    assert!(keys.contains(&"C1/employee_0.json".to_string()));
    assert!(keys.contains(&"C1/employee_1.json".to_string()));
}

#[tokio::test]
async fn missing_company_is_reported_as_not_found_with_200() {
    let (service, _) = setup();
    let response = dispatch(
        &service,
        post("/", json!({"action": "getCompany", "companyId": "ghost"})),
    )
    .await;

    assert_eq!(response.status_code, 200);
    let missing = body(&response);
    assert_eq!(missing["found"], false);
    assert_eq!(missing["responses"], json!({}));
}

#[tokio::test]
async fn status_of_unknown_company_has_defaults() {
    let (service, _) = setup();
    let response = dispatch(&service, ApiRequest::new("GET", "/company-status/C9")).await;

    assert_eq!(response.status_code, 200);
    let status = body(&response);
    assert_eq!(status["companyCompleted"], false);
    assert_eq!(status["companyInProgress"], false);
    assert_eq!(status["completionPercentage"], 0);
    assert_eq!(status["employeeCount"], 0);
    assert_eq!(status["nextEmployeeId"], 0);
    assert_eq!(status["status"], "not-started");
}

#[tokio::test]
async fn status_prefers_path_parameters_and_falls_back_to_query() {
    let (service, _) = setup();
    dispatch(
        &service,
        post("/save-employee", json!({"companyId": "C1", "employeeId": 5, "responses": {}})),
    )
    .await;

    let mut gateway = ApiRequest::new("GET", "/prod/company-status/C1");
    gateway.resource = Some("/company-status/{companyId}".to_string());
    gateway.path_parameters = Some(HashMap::from([("companyId".to_string(), "C1".to_string())]));
    let response = dispatch(&service, gateway).await;
    assert_eq!(body(&response)["employeeIds"], json!([5]));
    assert_eq!(body(&response)["nextEmployeeId"], 6);

    let response = dispatch(&service, ApiRequest::new("GET", "/").with_query("companyId", "C1")).await;
    assert_eq!(body(&response)["employeeCount"], 1);
}

#[tokio::test]
async fn employee_data_and_list_routes() {
    let (service, _) = setup();
    dispatch(
        &service,
        post("/save-employee", json!({"companyId": "C1", "employeeId": "2", "responses": {"q": "x"}})),
    )
    .await;

    let found = dispatch(&service, ApiRequest::new("GET", "/employee-data/C1/2")).await;
    assert_eq!(found.status_code, 200);
    assert_eq!(body(&found)["found"], true);
    assert_eq!(body(&found)["employeeData"]["responses"], json!({"q": "x"}));

    let missing = dispatch(&service, ApiRequest::new("GET", "/employee-data/C1/3")).await;
    assert_eq!(body(&missing)["found"], false);

    let listed = dispatch(&service, ApiRequest::new("GET", "/employee-list/C1")).await;
    assert_eq!(body(&listed)["employeeIds"], json!([2]));
}

#[tokio::test]
async fn wrong_methods_and_missing_parameters() {
    let (service, _) = setup();

    let response = dispatch(&service, ApiRequest::new("GET", "/save-company")).await;
    assert_eq!(response.status_code, 405);

    let response = dispatch(&service, ApiRequest::new("DELETE", "/")).await;
    assert_eq!(response.status_code, 405);
    assert_eq!(body(&response), json!({"error": "Method not allowed"}));

    let response = dispatch(&service, ApiRequest::new("GET", "/company-status")).await;
    assert_eq!(response.status_code, 400);

    let response = dispatch(&service, ApiRequest::new("GET", "/employee-data/C1")).await;
    assert_eq!(response.status_code, 400);
}

#[tokio::test]
async fn malformed_json_is_a_server_error() {
    let (service, store) = setup();
    let response = dispatch(&service, ApiRequest::new("POST", "/").with_body("{\"formType\":")).await;

    assert_eq!(response.status_code, 500);
    assert!(body(&response)["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON body"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn unknown_body_actions_are_rejected() {
    let (service, _) = setup();
    let response = dispatch(&service, post("/", json!({"action": "deleteEverything"}))).await;
    assert_eq!(response.status_code, 404);
}

#[tokio::test]
async fn exhausted_retries_surface_as_conflict() {
    let (service, store) = setup();
    store.inject_conflicts(3);
    let response = dispatch(
        &service,
        post("/save-company", json!({"companyId": "C1", "responses": {"q1": "a"}})),
    )
    .await;
    assert_eq!(response.status_code, 409);

    store.inject_conflicts(1);
    let response = dispatch(
        &service,
        post("/save-company", json!({"companyId": "C1", "responses": {"q1": "a"}})),
    )
    .await;
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn concurrent_new_employees_get_distinct_ids() {
    let (service, store) = setup();
    let request = json!({"formType": "employee", "companyId": "C1", "isNewEmployee": true, "responses": {}});

    let (a, b) = tokio::join!(
        dispatch(&service, post("/", request.clone())),
        dispatch(&service, post("/", request)),
    );

    assert_eq!(a.status_code, 200);
    assert_eq!(b.status_code, 200);
    assert_ne!(body(&a)["employeeId"], body(&b)["employeeId"]);
    assert_eq!(store.keys().await.len(), 2);
}

#[tokio::test]
async fn listing_failure_blocks_id_assignment() {
    let (service, store) = setup();
    store.fail_listing(true);
    let response = dispatch(
        &service,
        post("/save-employee", json!({"companyId": "C1", "isNewEmployee": true, "responses": {}})),
    )
    .await;
    assert_eq!(response.status_code, 500);
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn uploads_through_body_actions() {
    let (service, store) = setup();

    let presigned = dispatch(
        &service,
        post("/", json!({
            "action": "getPresignedUrl",
            "fileName": "a.pdf",
            "contentType": "application/pdf",
            "s3Key": "uploads/C1/a.pdf",
            "expires": 60
        })),
    )
    .await;
    assert_eq!(presigned.status_code, 200);
    assert_eq!(body(&presigned)["expires"], 60);
    assert_eq!(body(&presigned)["bucket"], "responses-test");

    let uploaded = dispatch(
        &service,
        post("/", json!({
            "action": "uploadFile",
            "fileData": STANDARD.encode(b"file body"),
            "fileName": "b.txt",
            "contentType": "text/plain",
            "s3Key": "uploads/C1/b.txt",
            "companyId": "C1",
            "questionId": "q2",
            "questionText": "Attach your policy",
            "registerMetadata": true
        })),
    )
    .await;
    assert_eq!(uploaded.status_code, 200);
    let uploaded = body(&uploaded);
    assert_eq!(uploaded["uploadMethod"], "lambda");
    assert_eq!(uploaded["fileSize"], 9);

    let metadata_key = uploaded["metadataKey"].as_str().unwrap();
    let (registry, _, _) = store.object(metadata_key).await.unwrap();
    let registry: Value = serde_json::from_slice(&registry).unwrap();
    assert_eq!(registry["questionText"], "Attach your policy");
    assert_eq!(registry["formType"], "company");
    assert_eq!(registry["s3Key"], "uploads/C1/b.txt");
    assert_eq!(registry["s3Bucket"], "responses-test");

    let rejected = dispatch(
        &service,
        post("/", json!({
            "action": "uploadFile",
            "fileData": "%%%",
            "fileName": "c.txt",
            "s3Key": "uploads/C1/c.txt"
        })),
    )
    .await;
    assert_eq!(rejected.status_code, 400);
}

#[tokio::test]
async fn file_uploads_accumulate_across_saves() {
    let (service, _) = setup();
    for question in ["q1", "q2"] {
        dispatch(
            &service,
            post("/save-company", json!({
                "companyId": "C1",
                "responses": {"q1": "a"},
                "fileMetadata": {"questionId": question, "fileName": format!("{}.pdf", question)}
            })),
        )
        .await;
    }

    let fetched = dispatch(&service, post("/", json!({"action": "getCompany", "companyId": "C1"}))).await;
    let uploads = &body(&fetched)["companyData"]["fileUploads"];
    assert_eq!(uploads["q1"]["fileName"], "q1.pdf");
    assert_eq!(uploads["q2"]["fileName"], "q2.pdf");
}

#[tokio::test]
async fn legacy_scheme_reads_older_records() {
    let (service, store) = setup_with(ServiceSettings {
        key_scheme: KeyScheme::Legacy,
        ..ServiceSettings::default()
    });
    store
        .seed(
            "company-responses/C1.json",
            r#"{
                "companyId": "C1",
                "responses": {"q1": "a", "q2": "b"},
                "lastModified": "2024-03-01T10:00:00.123456",
                "completionPercentage": 100.0,
                "completed": true
            }"#,
        )
        .await;
    store.seed("employee-responses/C1/0.json", "{}").await;
    store.seed("employee-responses/C1/7.json", "{}").await;

    let status = dispatch(&service, ApiRequest::new("GET", "/company-status/C1")).await;
    assert_eq!(status.status_code, 200);
    let status = body(&status);
    assert_eq!(status["status"], "completed");
    assert_eq!(status["companyCompleted"], true);
    assert_eq!(status["completionPercentage"], 100);
    assert_eq!(status["employeeIds"], json!([0, 7]));
    assert_eq!(status["nextEmployeeId"], 8);
}

#[tokio::test]
async fn legacy_employee_records_with_string_ids_are_served_and_updated() {
    let (service, store) = setup_with(ServiceSettings {
        key_scheme: KeyScheme::Legacy,
        ..ServiceSettings::default()
    });
    store
        .seed(
            "employee-responses/C1/3.json",
            r#"{
                "companyId": "C1",
                "employeeId": "3",
                "responses": {"q1": "a"},
                "lastModified": "2024-03-01T10:00:00"
            }"#,
        )
        .await;

    let found = dispatch(
        &service,
        post("/", json!({"action": "getEmployee", "companyId": "C1", "employeeId": 3})),
    )
    .await;
    assert_eq!(found.status_code, 200);
    let found = body(&found);
    assert_eq!(found["found"], true);
    assert_eq!(found["employeeId"], 3);
    assert_eq!(found["employeeData"]["employeeId"], 3);

    let saved = dispatch(
        &service,
        post("/save-employee", json!({"companyId": "C1", "employeeId": 3, "responses": {"q2": "b"}})),
    )
    .await;
    assert_eq!(saved.status_code, 200);
    assert_eq!(body(&saved)["employeeId"], 3);
}

#[tokio::test]
async fn legacy_company_progress_is_derived_from_its_answers() {
    let (service, store) = setup_with(ServiceSettings {
        key_scheme: KeyScheme::Legacy,
        ..ServiceSettings::default()
    });
    store
        .seed(
            "company-responses/C1.json",
            r#"{
                "companyId": "C1",
                "responses": {"q1": "a", "q2": "b", "q3": ""},
                "lastModified": "2024-03-01T10:00:00",
                "completionPercentage": 66.67
            }"#,
        )
        .await;

    let status = body(&dispatch(&service, ApiRequest::new("GET", "/company-status/C1")).await);
    assert_eq!(status["status"], "in-progress");
    assert_eq!(status["companyInProgress"], true);
    assert_eq!(status["completionPercentage"], 66);

    let found = body(&dispatch(&service, post("/", json!({"action": "getCompany", "companyId": "C1"}))).await);
    assert_eq!(found["inProgress"], true);
}
