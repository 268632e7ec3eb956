//! # Emitter
//!
//! Metric line emitter returned from lambda_dd_metrics::Builder

use super::line::{MetricLine, MetricType, MetricValue};
use super::{builder, Error};
use metrics::SharedString;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Where rendered lines go
pub(crate) enum Output {
    Stdout,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// Configuration via Builder
pub struct Config {
    pub service_prefix: SharedString,
    pub stats_group: SharedString,
    pub default_tags: Vec<SharedString>,
    pub timestamp: Option<u64>,
    #[cfg(feature = "lambda")]
    pub lambda_cold_start: Option<&'static str>,
    #[cfg(feature = "lambda")]
    pub lambda_error: Option<&'static str>,
}

/// DataDog Lambda metrics emitter
///
/// Every call writes exactly one self-contained line, nothing is buffered between calls.
/// Use [Builder](super::Builder) for anything beyond prefix and group.
///
/// # Example
/// ```
/// let metrics = lambda_dd_metrics::Emitter::new("app", "worker").unwrap();
///
/// // MONITORING|<now>|3|count|app.worker.jobs.done|#env:prod
/// metrics.incr_by("jobs.done", 3, &["env:prod"]).unwrap();
///
/// // MONITORING|<now>|42|gauge|app.worker.queue.depth
/// metrics.gauge("queue.depth", 42, &[]).unwrap();
/// ```
pub struct Emitter {
    pub config: Config,
    namespace: String,
    output: Output,
}

impl Emitter {
    /// Shorthand for a [Builder](super::Builder) with only a prefix and group, writing to stdout
    pub fn new(service_prefix: impl Into<SharedString>, stats_group: impl Into<SharedString>) -> Result<Self, Error> {
        builder::Builder::new()
            .service_prefix(service_prefix)
            .stats_group(stats_group)
            .build()
    }

    pub(crate) fn from_config(config: Config, output: Output) -> Self {
        let namespace = format!("{}.{}", &*config.service_prefix, &*config.stats_group);
        Self {
            config,
            namespace,
            output,
        }
    }

    /// The `prefix.group` every metric name starts with
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Increment a counter by one
    pub fn incr(&self, name: &str, tags: &[&str]) -> io::Result<()> {
        self.incr_by(name, 1, tags)
    }

    /// Increment a counter by `value`, a negative value is a decrement
    pub fn incr_by(&self, name: &str, value: impl Into<MetricValue>, tags: &[&str]) -> io::Result<()> {
        self.emit(MetricType::Count, name, value.into(), tags)
    }

    /// Report the current absolute reading of a gauge
    pub fn gauge(&self, name: &str, value: impl Into<MetricValue>, tags: &[&str]) -> io::Result<()> {
        self.emit(MetricType::Gauge, name, value.into(), tags)
    }

    /// Render and write a single line, call tags first and then the default tags
    pub(crate) fn emit<T: AsRef<str>>(
        &self,
        kind: MetricType,
        name: &str,
        value: MetricValue,
        tags: &[T],
    ) -> io::Result<()> {
        let metric_name = format!("{}.{}", self.namespace, name);

        let line = MetricLine {
            timestamp: self.timestamp(),
            value,
            kind,
            name: &metric_name,
            tags: tags
                .iter()
                .map(|tag| tag.as_ref())
                .chain(self.config.default_tags.iter().map(|tag| &**tag))
                .collect(),
        };

        // Render up front so the whole line reaches the sink in one write
        let mut buf = line.to_string();
        buf.push('\n');
        self.write(buf.as_bytes())
    }

    fn write(&self, buf: &[u8]) -> io::Result<()> {
        match &self.output {
            // Stdout::write_all holds the stdout lock for the whole buffer
            Output::Stdout => io::stdout().write_all(buf),
            Output::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                writer.write_all(buf)?;
                writer.flush()
            }
        }
    }

    /// Compute the timestamp unless it was set via [Builder::with_timestamp](super::Builder::with_timestamp)
    fn timestamp(&self) -> u64 {
        match self.config.timestamp {
            Some(t) => t,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SharedBuffer;
    use crate::Builder;

    fn emitter(prefix: &'static str, group: &'static str, buffer: &SharedBuffer) -> Emitter {
        Builder::new()
            .service_prefix(prefix)
            .stats_group(group)
            .with_timestamp(1234)
            .with_writer(buffer.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn incr_defaults_to_one() {
        let buffer = SharedBuffer::default();
        emitter("test", "group", &buffer).incr("test_metric", &[]).unwrap();

        assert_eq!(buffer.contents(), "MONITORING|1234|1|count|test.group.test_metric\n");
    }

    #[test]
    fn incr_by_with_tags() {
        let buffer = SharedBuffer::default();
        emitter("app", "worker", &buffer)
            .incr_by("jobs.done", 3, &["env:prod"])
            .unwrap();

        assert_eq!(buffer.contents(), "MONITORING|1234|3|count|app.worker.jobs.done|#env:prod\n");
    }

    #[test]
    fn negative_count_is_a_decrement() {
        let buffer = SharedBuffer::default();
        emitter("app", "worker", &buffer).incr_by("inflight", -2, &[]).unwrap();

        assert_eq!(buffer.contents(), "MONITORING|1234|-2|count|app.worker.inflight\n");
    }

    #[test]
    fn gauge_without_tags() {
        let buffer = SharedBuffer::default();
        emitter("app", "worker", &buffer).gauge("queue.depth", 42, &[]).unwrap();

        assert_eq!(buffer.contents(), "MONITORING|1234|42|gauge|app.worker.queue.depth\n");
    }

    #[test]
    fn gauge_accepts_f32_and_non_finite_values() {
        let buffer = SharedBuffer::default();
        let metrics = emitter("app", "worker", &buffer);

        metrics.gauge("ratio", 0.25f32, &[]).unwrap();
        metrics.gauge("ratio", f64::NAN, &["src:sensor"]).unwrap();
        metrics.gauge("ratio", f64::NEG_INFINITY, &[]).unwrap();

        assert_eq!(
            buffer.lines(),
            vec![
                "MONITORING|1234|0.25|gauge|app.worker.ratio",
                "MONITORING|1234|NaN|gauge|app.worker.ratio|#src:sensor",
                "MONITORING|1234|-inf|gauge|app.worker.ratio",
            ]
        );
    }

    #[test]
    fn default_tags_follow_call_tags() {
        let buffer = SharedBuffer::default();
        let metrics = Builder::new()
            .service_prefix("test")
            .stats_group("test_group")
            .with_tag("group:test_group")
            .with_tag("region:us-east-1")
            .with_timestamp(1234)
            .with_writer(buffer.clone())
            .build()
            .unwrap();

        metrics.incr("test_metric", &["tag1", "tag2"]).unwrap();
        metrics.gauge("temperature", 21.5, &[]).unwrap();

        assert_eq!(
            buffer.lines(),
            vec![
                "MONITORING|1234|1|count|test.test_group.test_metric|#tag1,tag2,group:test_group,region:us-east-1",
                "MONITORING|1234|21.5|gauge|test.test_group.temperature|#group:test_group,region:us-east-1",
            ]
        );
    }

    #[test]
    fn back_to_back_calls_are_independent_lines() {
        let buffer = SharedBuffer::default();
        let metrics = emitter("app", "worker", &buffer);

        metrics.incr("a", &["x:1"]).unwrap();
        metrics.incr("b", &[]).unwrap();

        assert_eq!(
            buffer.lines(),
            vec![
                "MONITORING|1234|1|count|app.worker.a|#x:1",
                "MONITORING|1234|1|count|app.worker.b",
            ]
        );
    }

    #[test]
    fn wall_clock_timestamp() {
        let buffer = SharedBuffer::default();
        let metrics = Builder::new()
            .service_prefix("app")
            .stats_group("worker")
            .with_writer(buffer.clone())
            .build()
            .unwrap();

        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        metrics.incr("ticks", &[]).unwrap();
        let after = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();

        let lines = buffer.lines();
        let fields: Vec<&str> = lines[0].split('|').collect();
        let timestamp: u64 = fields[1].parse().unwrap();
        assert!(before <= timestamp && timestamp <= after);
    }

    #[test]
    fn write_errors_propagate() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let metrics = Builder::new()
            .service_prefix("app")
            .stats_group("worker")
            .with_writer(Broken)
            .build()
            .unwrap();

        let err = metrics.incr("ticks", &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn concurrent_callers_never_split_lines() {
        let buffer = SharedBuffer::default();
        let metrics = emitter("app", "worker", &buffer);

        std::thread::scope(|s| {
            for thread in 0..4 {
                let metrics = &metrics;
                s.spawn(move || {
                    for _ in 0..50 {
                        metrics.incr_by("hits", thread, &["source:thread"]).unwrap();
                    }
                });
            }
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 200);
        for line in lines {
            assert!(line.starts_with("MONITORING|1234|"));
            assert!(line.ends_with("|count|app.worker.hits|#source:thread"));
        }
    }
}
