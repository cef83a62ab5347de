use crate::error::Result;
use crate::proto::TimeSeries;
use crate::series::{self, Collector};
use crate::value::{GaugeValue, Value};
use crate::vec::LabelVector;

/// A value for each tuple of label values that can be set, raised or lowered.
pub struct Gauge {
    vec: LabelVector<GaugeValue>,
}

impl Gauge {
    pub fn new(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Result<Self> {
        Ok(Gauge {
            vec: LabelVector::new(name, help, labels, &[])?,
        })
    }

    pub fn name(&self) -> &str {
        self.vec.name()
    }

    pub fn labels(&self) -> &[String] {
        self.vec.labels()
    }

    pub fn set(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.vec
            .get_or_create(label_values, GaugeValue::default)?
            .value()
            .set(value);
        Ok(())
    }

    pub fn add(&self, label_values: &[&str], delta: f64) -> Result<()> {
        self.vec
            .get_or_create(label_values, GaugeValue::default)?
            .value()
            .add(delta);
        Ok(())
    }

    pub fn sub(&self, label_values: &[&str], delta: f64) -> Result<()> {
        self.vec
            .get_or_create(label_values, GaugeValue::default)?
            .value()
            .sub(delta);
        Ok(())
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.add(label_values, 1.0)
    }

    pub fn dec(&self, label_values: &[&str]) -> Result<()> {
        self.sub(label_values, 1.0)
    }

    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.vec.get(label_values)?.value().get())
    }

    pub fn reset(&self) {
        self.vec.reset();
    }
}

impl Collector for Gauge {
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries> {
        series::scalar_series(&self.vec, timestamp)
    }
}
