use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("label values do not match labels: expected {expected} values, got {got}")]
    SchemaMismatch { expected: usize, got: usize },
    #[error("no series recorded for label values {0:?}")]
    NotFound(Vec<String>),
    #[error("no bucket with upper bound {0}")]
    BucketNotFound(f64),
    #[error("invalid buckets: {0}")]
    InvalidBuckets(String),
    #[error("invalid metric name: {0:?}")]
    InvalidName(String),
    #[error("invalid label name: {0:?}")]
    InvalidLabel(String),
}

pub type Result<T> = std::result::Result<T, MetricError>;
