//! Labeled counters, gauges and histograms that render themselves as
//! Prometheus remote-write time series.

pub mod counter;
pub mod debug;
pub mod error;
pub mod gauge;
pub mod histogram;
pub mod proto;
pub mod registry;
pub mod series;
pub mod value;
pub mod vec;

pub use counter::Counter;
pub use error::{MetricError, Result};
pub use gauge::Gauge;
pub use histogram::{Buckets, Histogram, DEFAULT_BUCKETS};
pub use registry::{timestamp_millis, Registry};
pub use series::Collector;
