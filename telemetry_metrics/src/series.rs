//! Rendering instrument state as remote write time series.

use crate::debug::DEBUG;
use crate::error::{MetricError, Result};
use crate::proto::{Label, Sample, TimeSeries};
use crate::value::Value;
use crate::vec::LabelVector;

/// The reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Anything that can render its current state as a batch of time series.
pub trait Collector: Send + Sync {
    /// Render one sample per series, stamped with `timestamp` (milliseconds).
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries>;
}

/// Build the label list of a series: `__name__` first, then each label in schema order.
pub fn labels(name: &str, label_names: &[String], label_values: &[String]) -> Result<Vec<Label>> {
    if label_names.len() != label_values.len() {
        return Err(MetricError::SchemaMismatch {
            expected: label_names.len(),
            got: label_values.len(),
        });
    }
    let mut labels = Vec::with_capacity(2 + label_names.len());
    labels.push(Label::new(METRIC_NAME_LABEL, name));
    for (label, value) in label_names.iter().zip(label_values) {
        labels.push(Label::new(label.as_str(), value.as_str()));
    }
    Ok(labels)
}

/// Format a bucket bound as the shortest decimal that parses back to the same `f64`.
pub fn format_bound(bound: f64) -> String {
    if bound == f64::INFINITY {
        "+Inf".into()
    } else if bound == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        bound.to_string()
    }
}

pub(crate) fn single_sample(labels: Vec<Label>, value: f64, timestamp: i64) -> TimeSeries {
    TimeSeries {
        labels,
        samples: vec![Sample { value, timestamp }],
    }
}

/// Log and count a tuple that could not be rendered.
pub(crate) fn skip_series(name: &str, err: &MetricError) {
    DEBUG.series_skipped();
    tracing::warn!(metric = %name, error = %err, "skipping series");
}

/// Render one series per recorded tuple of a counter or gauge.
pub(crate) fn scalar_series<V: Value>(vec: &LabelVector<V>, timestamp: i64) -> Vec<TimeSeries> {
    let entries = vec.entries();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries.iter() {
        let labels = match labels(vec.name(), vec.labels(), entry.label_values()) {
            Ok(labels) => labels,
            Err(err) => {
                skip_series(vec.name(), &err);
                continue;
            }
        };
        out.push(single_sample(labels, entry.value().get(), timestamp));
    }
    DEBUG.series_rendered(out.len());
    out
}
