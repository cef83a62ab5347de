use crate::error::Result;
use crate::proto::TimeSeries;
use crate::series::{self, Collector};
use crate::value::{CounterValue, Value};
use crate::vec::LabelVector;

/// A cumulative sum for each tuple of label values.
pub struct Counter {
    vec: LabelVector<CounterValue>,
}

impl Counter {
    pub fn new(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Result<Self> {
        Ok(Counter {
            vec: LabelVector::new(name, help, labels, &[])?,
        })
    }

    pub fn name(&self) -> &str {
        self.vec.name()
    }

    pub fn help(&self) -> &str {
        self.vec.help()
    }

    pub fn labels(&self) -> &[String] {
        self.vec.labels()
    }

    pub fn label_values(&self) -> Vec<Vec<String>> {
        self.vec.label_values()
    }

    /// Adds `delta` to the series; the sign of `delta` is not checked.
    pub fn add(&self, label_values: &[&str], delta: f64) -> Result<()> {
        self.vec
            .get_or_create(label_values, CounterValue::default)?
            .value()
            .add(delta);
        Ok(())
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.vec
            .get_or_create(label_values, CounterValue::default)?
            .value()
            .inc();
        Ok(())
    }

    /// The current value, or `NotFound` if the tuple was never used.
    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.vec.get(label_values)?.value().get())
    }

    pub fn reset(&self) {
        self.vec.reset();
    }
}

impl Collector for Counter {
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries> {
        series::scalar_series(&self.vec, timestamp)
    }
}
