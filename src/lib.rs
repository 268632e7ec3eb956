pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    builder::Builder,
    emitter::Emitter,
    line::{MetricLine, MetricType, MetricValue},
    recorder::Recorder,
};

mod builder;
mod emitter;
#[cfg(feature = "lambda")]
pub mod lambda;
mod line;
mod recorder;
