use chrono::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::proto::TimeSeries;
use crate::series::Collector;

/// The current time in milliseconds since the unix epoch, as used by sample timestamps.
pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A set of collectors flushed together.
#[derive(Default)]
pub struct Registry {
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, collector: Arc<dyn Collector>) {
        self.collectors.write().push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.read().is_empty()
    }

    /// Render every registered collector, in registration order.
    pub fn gather(&self, timestamp: i64) -> Vec<TimeSeries> {
        let collectors = self.collectors.read().clone();
        let mut out = Vec::new();
        for collector in collectors {
            out.extend(collector.time_series(timestamp));
        }
        out
    }
}

impl Collector for Registry {
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries> {
        self.gather(timestamp)
    }
}
