//! services/responses_api/src/bin/lambda.rs
//!
//! The AWS Lambda entry point behind the API Gateway proxy integration.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use responses_api_lib::{
    build_service,
    config::Config,
    service::ResponseService,
    web::{dispatch, ApiRequest, ApiResponse},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tracing::instrument(skip_all, fields(request_id = %event.context.request_id))]
async fn handler(
    service: &ResponseService,
    event: LambdaEvent<ApiRequest>,
) -> Result<ApiResponse, Error> {
    let response = dispatch(service, event.payload).await;
    info!("Responding with status {}", response.status_code);
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let service = build_service(&config).await;
    info!("Response store lambda ready");

    let func = service_fn(move |event: LambdaEvent<ApiRequest>| {
        let service = service.clone();

        async move { handler(&service, event).await }
    });

    run(func).await
}
