//! services/responses_api/src/bin/api.rs
//!
//! Serves the response store over plain HTTP for local development.

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{any, get},
    Router,
};
use responses_api_lib::{
    build_service,
    config::Config,
    error::ApiError,
    web::rest::{
        company_status_handler, employee_data_handler, employee_list_handler, forward_handler,
        preflight_handler, query_handler, save_company_handler, save_employee_handler,
        submit_handler, ApiDoc,
    },
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Storage Adapter & Service ---
    let service = build_service(&config).await;

    // --- 3. Create the Web Router ---
    // Unknown methods on known paths still reach the router so they get a 405 envelope.
    let api_router = Router::new()
        .route("/save-company", any(save_company_handler))
        .route("/save-employee", any(save_employee_handler))
        .route("/company-status/{companyId}", any(company_status_handler))
        .route("/employee-list/{companyId}", any(employee_list_handler))
        .route(
            "/employee-data/{companyId}/{employeeId}",
            any(employee_data_handler),
        )
        .route(
            "/",
            get(query_handler)
                .post(submit_handler)
                .options(preflight_handler)
                .fallback(forward_handler),
        )
        .fallback(forward_handler)
        .with_state(service);

    // The docs may be fetched from other origins; the API sets its own CORS headers.
    let docs_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);
    let docs_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(docs_cors);

    let app = Router::new().merge(docs_router).merge(api_router);

    // --- 4. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
