//! # Line
//!
//! The DataDog Lambda log line understood by the log forwarder
//!
//! ```plaintext
//! MONITORING|<unix_epoch_timestamp>|<value>|<metric_type>|<metric_name>|#<tag1>,<tag2>
//! ```
//!
//! <https://www.datadoghq.com/blog/monitoring-lambda-functions-datadog>

use std::fmt;

/// Marker the forwarder looks for at the start of a metric line
pub const MONITORING_PREFIX: &str = "MONITORING";

/// Metric types the Lambda log integration accepts
///
/// Histograms and sets have no ingestion path through the log forwarder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Count,
    Gauge,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Count => "count",
            MetricType::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric value of a metric line, printed as a plain number
///
/// Converts from the primitive integers up to 64 bits and from both float widths.
/// NaN and infinities are written as `NaN`, `inf` and `-inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

macro_rules! metric_value_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for MetricValue {
                #[allow(clippy::unnecessary_cast)]
                fn from(value: $source) -> Self {
                    MetricValue::$variant(value as $target)
                }
            }
        )+
    };
}

metric_value_from!(Signed, i64, i8, i16, i32, i64, isize);
metric_value_from!(Unsigned, u64, u8, u16, u32, u64, usize);
metric_value_from!(Float, f64, f32, f64);

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Signed(v) => write!(f, "{v}"),
            MetricValue::Unsigned(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A single metric event, rendered via [fmt::Display] without the trailing newline
#[derive(Debug, Clone)]
pub struct MetricLine<'a> {
    pub timestamp: u64,
    pub value: MetricValue,
    pub kind: MetricType,
    pub name: &'a str,
    pub tags: Vec<&'a str>,
}

impl fmt::Display for MetricLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{MONITORING_PREFIX}|{}|{}|{}|{}",
            self.timestamp, self.value, self.kind, self.name
        )?;

        // The tag section is omitted entirely rather than left as a dangling "|#"
        if let Some((first, rest)) = self.tags.split_first() {
            write!(f, "|#{first}")?;
            for tag in rest {
                write!(f, ",{tag}")?;
            }
        }

        Ok(())
    }
}
