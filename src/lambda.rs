//! Additional functionality for integration with [lambda_runtime] and [lambda_http]
//!
//! Inspired by Lambda Power Tools
//!
//! *this module requires the `lambda` feature flag*
//!
//! # Simple Example
//! ```ignore
//!
//! use lambda_runtime::{Error, LambdaEvent};
//! // This replaces lambda_runtime::run and lambda_runtime::service_fn
//! use lambda_dd_metrics::lambda::handler::run;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct Request {}
//!
//! #[derive(Serialize)]
//! struct Response {}
//!
//! async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
//!
//!     // Do something important
//!
//!     metrics::counter!("requests", "method" => "default").increment(1);
//!
//!     Ok(Response {})
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
//!         .with_target(false)
//!         .without_time()
//!         .compact()
//!         .init();
//!
//!     let metrics = lambda_dd_metrics::Builder::new()
//!         .service_prefix("myapp")
//!         .stats_group("api")
//!         .lambda_cold_start_metric("cold_start")
//!         .lambda_error_metric("errors")
//!         .init()
//!         .unwrap();
//!
//!     run(metrics, function_handler).await
//! }
//! ```
//!
//! # Output
//!
//! ```plaintext
//! START RequestId: 4bd2d365-3792-46c8-9b6c-6132f9630fbb Version: $LATEST
//! MONITORING|1687947426|1|count|myapp.api.cold_start
//! MONITORING|1687947426|1|count|myapp.api.requests|#method:default
//! END RequestId: 4bd2d365-3792-46c8-9b6c-6132f9630fbb
//! ```
//! # Advanced Usage
//!
//! If you're building a more sophisticated [tower] stack, use [MetricsService] instead
//!

use super::emitter::Emitter;
use lambda_runtime::LambdaEvent;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::error;

/// [tower::Service] emitting the `lambda` metrics configured in [Builder](super::Builder)
///
/// For composing your own [tower] stacks to input into the Rust Lambda Runtime
pub struct MetricsService<S> {
    metrics: &'static Emitter,
    inner: S,
    cold_start: bool,
}

impl<S> MetricsService<S> {
    /// Constructs a new [MetricsService] with the given [Emitter] and inner [`tower::Service<LambdaEvent<Request>>`]
    /// to wrap
    pub fn new(metrics: &'static Emitter, inner: S) -> MetricsService<S> {
        Self {
            metrics,
            inner,
            cold_start: true,
        }
    }
}

/// Increment a counter, logging instead of failing the invocation
fn incr_or_log(metrics: &Emitter, name: &str) {
    if let Err(err) = metrics.incr(name, &[]) {
        error!("Failed to write lambda metric {name}: {err}");
    }
}

impl<S, Request> tower::Service<LambdaEvent<Request>> for MetricsService<S>
where
    S: tower::Service<LambdaEvent<Request>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsServiceFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: LambdaEvent<Request>) -> Self::Future {
        if std::mem::take(&mut self.cold_start) {
            if let Some(counter_name) = self.metrics.config.lambda_cold_start {
                incr_or_log(self.metrics, counter_name);
            }
        }

        // Wrap the inner Future so we can count errors once it's done
        MetricsServiceFuture {
            metrics: self.metrics,
            inner: self.inner.call(req),
        }
    }
}

#[pin_project]
#[doc(hidden)]
pub struct MetricsServiceFuture<F> {
    metrics: &'static Emitter,
    #[pin]
    inner: F,
}

impl<F, Response, Error> Future for MetricsServiceFuture<F>
where
    F: Future<Output = Result<Response, Error>>,
{
    type Output = Result<Response, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        if result.is_err() {
            if let Some(counter_name) = this.metrics.config.lambda_error {
                incr_or_log(*this.metrics, counter_name);
            }
        }

        Poll::Ready(result)
    }
}

/// Helpers for starting the Lambda Rust runtime with a [tower::Service] wrapped by a [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod service {

    use super::*;

    /// Start the Lambda Rust runtime with a given [`tower::Service<LambdaEvent<Request>>`]
    /// which is then wrapped by new [MetricsService] with a given [Emitter]
    pub async fn run<S, Request, Response>(metrics: &'static Emitter, inner: S) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<LambdaEvent<Request>, Response = Response>,
        S::Future: std::future::Future<Output = Result<Response, S::Error>>,
        S::Error: Into<lambda_runtime::Diagnostic> + std::fmt::Debug,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new(metrics, inner)).await
    }

    /// Start the Lambda Rust runtime with a given [tower::Service<lambda_http::Request>]
    /// which is then wrapped by new [MetricsService] with a given [Emitter]
    pub async fn run_http<'a, R, S, E>(metrics: &'static Emitter, inner: S) -> Result<(), lambda_runtime::Error>
    where
        S: tower::Service<lambda_http::Request, Response = R, Error = E>,
        S::Future: Send + 'a,
        R: lambda_http::IntoResponse,
        E: std::fmt::Debug + Into<lambda_runtime::Diagnostic>,
    {
        run(metrics, lambda_http::Adapter::from(inner)).await
    }
}

/// Helpers for starting the Lambda Rust runtime with a handler function wrapped by the [MetricsService]
///
/// Reduces the amount of ceremony needed in `main()` for simple use cases
///
pub mod handler {

    use super::*;

    /// Start the Lambda Rust runtime with a given [LambdaEvent] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run<T, F, Request, Response>(metrics: &'static Emitter, handler: T) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(LambdaEvent<Request>) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>>,
        Request: for<'de> serde::Deserialize<'de>,
        Response: serde::Serialize,
    {
        lambda_runtime::run(MetricsService::new(metrics, lambda_runtime::service_fn(handler))).await
    }

    /// Start the Lambda Rust runtime with a given [lambda_http::Request] handler function
    /// which is then wrapped by a new [MetricsService] with a given [Emitter]
    pub async fn run_http<'a, T, F, Response>(metrics: &'static Emitter, handler: T) -> Result<(), lambda_runtime::Error>
    where
        T: FnMut(lambda_http::Request) -> F,
        F: Future<Output = Result<Response, lambda_runtime::Error>> + Send + 'a,
        Response: lambda_http::IntoResponse,
    {
        super::service::run_http(metrics, lambda_http::service_fn(handler)).await
    }
}
