use super::emitter::{self, Emitter, Output};
use super::recorder::Recorder;
use super::Error;
use metrics::SharedString;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Builder for the DataDog Lambda metrics Emitter
///
/// # Example
/// ```
///  let metrics = lambda_dd_metrics::Builder::new()
///      .service_prefix("MyApplication")
///      .stats_group("api")
///      .with_tag("env:prod")
///      .build()
///      .unwrap();
/// ```
#[derive(Default)]
pub struct Builder {
    service_prefix: Option<SharedString>,
    stats_group: Option<SharedString>,
    default_tags: Vec<SharedString>,
    timestamp: Option<u64>,
    writer: Option<Box<dyn Write + Send>>,
    #[cfg(feature = "lambda")]
    lambda_cold_start: Option<&'static str>,
    #[cfg(feature = "lambda")]
    lambda_error: Option<&'static str>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first segment of every metric name
    /// * Must be set and non-empty or build() will return Err("service_prefix missing")
    pub fn service_prefix(self, prefix: impl Into<SharedString>) -> Self {
        Self {
            service_prefix: Some(prefix.into()),
            ..self
        }
    }

    /// Sets the second segment of every metric name, giving `prefix.group.<name>`
    /// * Must be set and non-empty or build() will return Err("stats_group missing")
    pub fn stats_group(self, group: impl Into<SharedString>) -> Self {
        Self {
            stats_group: Some(group.into()),
            ..self
        }
    }

    /// Adds a static tag, written after the per-call tags of every line
    /// * Tags are passed through verbatim, use the `key:value` form DataDog expects
    /// * This method can be called multiple times, order is preserved
    pub fn with_tag(mut self, tag: impl Into<SharedString>) -> Self {
        self.default_tags.push(tag.into());
        self
    }

    /// Pins the unix timestamp (seconds) written on every line instead of reading the clock
    pub fn with_timestamp(self, timestamp: u64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Writes lines to `writer` instead of stdout
    pub fn with_writer(self, writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            ..self
        }
    }

    /// Emits a counter with the given name on the first invocation to mark a cold start
    ///
    /// This is to mimic the behavior of lambda power tools
    #[cfg(feature = "lambda")]
    pub fn lambda_cold_start_metric(mut self, name: &'static str) -> Self {
        self.lambda_cold_start = Some(name);
        self
    }

    /// Increments a counter with the given name whenever the wrapped handler returns an error
    #[cfg(feature = "lambda")]
    pub fn lambda_error_metric(mut self, name: &'static str) -> Self {
        self.lambda_error = Some(name);
        self
    }

    /// Consume the builder into an [Emitter] without touching the global metrics recorder
    pub fn build(self) -> Result<Emitter, Error> {
        let config = emitter::Config {
            service_prefix: self
                .service_prefix
                .filter(|prefix| !prefix.is_empty())
                .ok_or("service_prefix missing")?,
            stats_group: self
                .stats_group
                .filter(|group| !group.is_empty())
                .ok_or("stats_group missing")?,
            default_tags: self.default_tags,
            timestamp: self.timestamp,
            #[cfg(feature = "lambda")]
            lambda_cold_start: self.lambda_cold_start,
            #[cfg(feature = "lambda")]
            lambda_error: self.lambda_error,
        };

        let output = match self.writer {
            Some(writer) => Output::Writer(Mutex::new(writer)),
            None => Output::Stdout,
        };

        Ok(Emitter::from_config(config, output))
    }

    /// Intialize the emitter including the call to metrics::set_global_recorder
    pub fn init(self) -> Result<&'static Emitter, Error> {
        let emitter = Arc::new(self.build()?);
        metrics::set_global_recorder(Recorder::from(emitter.clone()))
            .map_err(|_| "metrics recorder already installed")?;

        // Only leaked once the recorder owns a handle, a failed install drops the emitter
        let emitter: &'static Emitter = &**Box::leak(Box::new(emitter));
        debug!(namespace = emitter.namespace(), "installed DataDog metrics recorder");
        Ok(emitter)
    }
}
