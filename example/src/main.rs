use lambda_dd_metrics::lambda::handler::run;
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
struct Request {
    jobs: Vec<String>,
}

#[derive(Serialize)]
struct Response {
    req_id: String,
    processed: usize,
}

async fn function_handler(
    metrics: &lambda_dd_metrics::Emitter,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let processed = event.payload.jobs.len();

    // Direct calls surface write failures to the handler
    metrics.incr_by("jobs.done", processed, &["queue:default"])?;
    metrics.gauge("jobs.batch_size", processed, &[])?;

    // The metrics facade goes through the installed recorder
    metrics::counter!("requests", "method" => "default").increment(1);

    info!(processed, "handled batch");

    Ok(Response {
        req_id: event.context.request_id,
        processed,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let metrics = lambda_dd_metrics::Builder::new()
        .service_prefix("demo")
        .stats_group("batch")
        .with_tag(format!(
            "function:{}",
            std::env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default()
        ))
        .lambda_cold_start_metric("cold_start")
        .lambda_error_metric("errors")
        .init()?;

    run(metrics, |event| function_handler(metrics, event)).await
}
