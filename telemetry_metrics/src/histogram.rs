use crate::debug::DEBUG;
use crate::error::{MetricError, Result};
use crate::proto::{Label, TimeSeries};
use crate::series::{self, format_bound, Collector, METRIC_NAME_LABEL};
use crate::value::{CounterValue, Value};
use crate::vec::{Entry, LabelVector};
use std::sync::Arc;

/// The label holding a bucket's upper bound.
pub const BUCKET_LABEL: &str = "le";

/// Bucket bounds used when a histogram is built with an empty bound list.
pub const DEFAULT_BUCKETS: &[f64] = &[25.0, 50.0, 75.0, 100.0, 200.0, 500.0, 1000.0];

/// The finite upper bounds of a histogram's buckets, strictly ascending.
///
/// The `+Inf` bucket is implicit and always rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct Buckets(Vec<f64>);

impl Buckets {
    /// Validates `bounds`.
    ///
    /// An empty list selects `DEFAULT_BUCKETS`, and a trailing `+Inf` is dropped.
    /// Bounds that are out of order, repeated, NaN or otherwise infinite are rejected.
    pub fn new(bounds: impl Into<Vec<f64>>) -> Result<Self> {
        let mut bounds = bounds.into();
        if bounds.is_empty() {
            return Ok(Buckets::default());
        }
        if bounds.last() == Some(&f64::INFINITY) {
            bounds.pop();
        }
        if let Some(bound) = bounds.iter().find(|b| !b.is_finite()) {
            return Err(MetricError::InvalidBuckets(format!(
                "bound {} is not finite",
                format_bound(*bound)
            )));
        }
        if let Some(pair) = bounds.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(MetricError::InvalidBuckets(format!(
                "bounds must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }
        Ok(Buckets(bounds))
    }

    pub fn bounds(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the smallest bound `>= value`, or `None` if `value` only fits in `+Inf`.
    ///
    /// NaN is not `<=` any bound, so it also lands in `+Inf` only.
    fn bucket_for(&self, value: f64) -> Option<usize> {
        // Bounds are sorted (checked in `new`)
        let i = self.0.partition_point(|bound| !(value <= *bound));
        if i < self.0.len() {
            Some(i)
        } else {
            None
        }
    }

    /// Index of the bound exactly equal to `le`.
    fn position(&self, le: f64) -> Result<usize> {
        self.0
            .iter()
            .position(|bound| *bound == le)
            .ok_or(MetricError::BucketNotFound(le))
    }
}

impl Default for Buckets {
    fn default() -> Self {
        Buckets(DEFAULT_BUCKETS.to_vec())
    }
}

/// Per-tuple histogram state.
///
/// `buckets[i]` is cumulative: it counts every observation `<= bounds[i]`.
#[derive(Debug)]
pub struct HistogramValue {
    buckets: Box<[CounterValue]>,
    sum: CounterValue,
    count: CounterValue,
}

impl HistogramValue {
    fn new(n: usize) -> Self {
        HistogramValue {
            buckets: (0..n).map(|_| CounterValue::default()).collect(),
            sum: CounterValue::default(),
            count: CounterValue::default(),
        }
    }
}

/// Distributes observations into cumulative buckets, per tuple of label values.
///
/// Renders `<name>_bucket` (one per bound plus `le="+Inf"`), `<name>_sum` and
/// `<name>_count` for every recorded tuple.
pub struct Histogram {
    vec: LabelVector<HistogramValue>,
    buckets: Buckets,
}

impl Histogram {
    /// `labels` must not include the `le` label; it is added when rendering.
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[&str],
        buckets: Buckets,
    ) -> Result<Self> {
        Ok(Histogram {
            vec: LabelVector::new(name, help, labels, &[BUCKET_LABEL])?,
            buckets,
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

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    fn entry(&self, label_values: &[&str]) -> Result<Arc<Entry<HistogramValue>>> {
        let n = self.buckets.len();
        self.vec.get_or_create(label_values, || HistogramValue::new(n))
    }

    /// Records one observation.
    ///
    /// A value above every finite bound is counted only by `+Inf`, `_sum` and `_count`.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        let entry = self.entry(label_values)?;
        let state = entry.value();
        // Count first and then buckets from the top down, the reverse of the
        // render order, so a concurrent flush never sees a lower bucket ahead
        // of a higher one.
        state.count.inc();
        if let Some(i) = self.buckets.bucket_for(value) {
            for bucket in state.buckets[i..].iter().rev() {
                bucket.inc();
            }
        }
        state.sum.add(value);
        Ok(())
    }

    /// Adds `amount` to the cumulative count of the bucket bounded by `le`.
    ///
    /// Meant for importing pre-aggregated buckets; `_sum` and `_count` are not touched.
    pub fn add(&self, label_values: &[&str], amount: f64, le: f64) -> Result<()> {
        let i = self.buckets.position(le)?;
        self.entry(label_values)?.value().buckets[i].add(amount);
        Ok(())
    }

    pub fn add_sum(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.entry(label_values)?.value().sum.add(value);
        Ok(())
    }

    pub fn set_sum(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.entry(label_values)?.value().sum.set(value);
        Ok(())
    }

    pub fn add_count(&self, label_values: &[&str], count: f64) -> Result<()> {
        self.entry(label_values)?.value().count.add(count);
        Ok(())
    }

    pub fn set_count(&self, label_values: &[&str], count: f64) -> Result<()> {
        self.entry(label_values)?.value().count.set(count);
        Ok(())
    }

    pub fn bucket_value(&self, label_values: &[&str], le: f64) -> Result<f64> {
        let entry = self.vec.get(label_values)?;
        if le == f64::INFINITY {
            return Ok(entry.value().count.get());
        }
        let i = self.buckets.position(le)?;
        Ok(entry.value().buckets[i].get())
    }

    pub fn sum(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.vec.get(label_values)?.value().sum.get())
    }

    pub fn count(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.vec.get(label_values)?.value().count.get())
    }

    pub fn reset(&self) {
        self.vec.reset();
    }
}

impl Collector for Histogram {
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries> {
        let name = self.vec.name();
        let bucket_name = format!("{}_bucket", name);
        let sum_name = format!("{}_sum", name);
        let count_name = format!("{}_count", name);

        let entries = self.vec.entries();
        let mut out = Vec::with_capacity(entries.len() * (self.buckets.len() + 3));
        for entry in entries.iter() {
            let base = match series::labels(&bucket_name, self.vec.labels(), entry.label_values()) {
                Ok(labels) => labels,
                Err(err) => {
                    series::skip_series(name, &err);
                    continue;
                }
            };
            let state = entry.value();
            // Buckets bottom up, then count; see `observe`
            let values = state.buckets.iter().map(|bucket| bucket.get()).collect::<Vec<_>>();
            let count = state.count.get();

            let bounds = self.buckets.bounds().iter().copied();
            for (bound, value) in bounds.zip(values).chain(Some((f64::INFINITY, count))) {
                let mut labels = base.clone();
                labels.push(Label::new(BUCKET_LABEL, format_bound(bound)));
                out.push(series::single_sample(labels, value, timestamp));
            }

            let sum = state.sum.get();
            for (series_name, value) in [(&sum_name, sum), (&count_name, count)] {
                let mut labels = base.clone();
                labels[0] = Label::new(METRIC_NAME_LABEL, series_name.as_str());
                out.push(series::single_sample(labels, value, timestamp));
            }
        }
        DEBUG.series_rendered(out.len());
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn histogram(bounds: &[f64]) -> Histogram {
        Histogram::new("latency", "help", &["l1", "l2"], Buckets::new(bounds).unwrap()).unwrap()
    }

    fn rendered(series: &[TimeSeries]) -> Vec<(String, Option<String>, f64)> {
        series
            .iter()
            .map(|ts| {
                (
                    ts.label("__name__").unwrap().to_string(),
                    ts.label("le").map(String::from),
                    ts.samples[0].value,
                )
            })
            .collect()
    }

    fn expected(rows: &[(&str, Option<&str>, f64)]) -> Vec<(String, Option<String>, f64)> {
        rows.iter()
            .map(|(name, le, value)| (name.to_string(), le.map(String::from), *value))
            .collect()
    }

    fn load_pre_aggregated(hg: &Histogram, lvs: &[&str]) {
        hg.add(lvs, 5.0, 50.0).unwrap();
        hg.add(lvs, 8.0, 100.0).unwrap();
        hg.add(lvs, 13.0, 200.0).unwrap();
        hg.add_count(lvs, 14.0).unwrap();
        hg.add_sum(lvs, 1500.0).unwrap();
    }

    #[test]
    fn renders_pre_aggregated_buckets() {
        let hg = histogram(&[50.0, 100.0, 200.0]);
        load_pre_aggregated(&hg, &["v1", "v2"]);

        let series = hg.time_series(1000);
        assert_eq!(
            rendered(&series),
            expected(&[
                ("latency_bucket", Some("50"), 5.0),
                ("latency_bucket", Some("100"), 8.0),
                ("latency_bucket", Some("200"), 13.0),
                ("latency_bucket", Some("+Inf"), 14.0),
                ("latency_sum", None, 1500.0),
                ("latency_count", None, 14.0),
            ])
        );
        for ts in &series {
            assert_eq!(ts.labels[0].name, "__name__");
            assert_eq!(ts.label("l1"), Some("v1"));
            assert_eq!(ts.label("l2"), Some("v2"));
            let expected_len = if ts.label("le").is_some() { 4 } else { 3 };
            assert_eq!(ts.labels.len(), expected_len);
            assert_eq!(ts.samples.len(), 1);
            assert_eq!(ts.samples[0].timestamp, 1000);
        }
        // `le` is always the last label
        assert_eq!(series[0].labels[3].name, "le");
    }

    #[test]
    fn values_accumulate_across_renders() {
        let hg = histogram(&[50.0, 100.0, 200.0]);
        load_pre_aggregated(&hg, &["v1", "v2"]);
        let first = hg.time_series(0);
        load_pre_aggregated(&hg, &["v1", "v2"]);
        let second = hg.time_series(0);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.labels, b.labels);
            assert_eq!(b.samples[0].value, 2.0 * a.samples[0].value);
        }
    }

    #[test]
    fn observe_is_cumulative() {
        let hg = histogram(&[50.0, 100.0, 200.0]);
        let lvs = ["a", "b"];
        for value in [10.0, 50.0, 75.0, 150.0, 250.0, 1000.0] {
            hg.observe(&lvs, value).unwrap();
        }
        assert_eq!(
            rendered(&hg.time_series(0)),
            expected(&[
                ("latency_bucket", Some("50"), 2.0),
                ("latency_bucket", Some("100"), 3.0),
                ("latency_bucket", Some("200"), 4.0),
                ("latency_bucket", Some("+Inf"), 6.0),
                ("latency_sum", None, 1535.0),
                ("latency_count", None, 6.0),
            ])
        );
        assert_eq!(hg.bucket_value(&lvs, 100.0).unwrap(), 3.0);
        assert_eq!(hg.bucket_value(&lvs, f64::INFINITY).unwrap(), 6.0);
        assert_eq!(hg.sum(&lvs).unwrap(), 1535.0);
        assert_eq!(hg.count(&lvs).unwrap(), 6.0);
    }

    #[test]
    fn overflow_only_reaches_inf_sum_and_count() {
        let hg = histogram(&[1.0, 2.0]);
        hg.observe(&["a", "b"], 99.0).unwrap();
        assert_eq!(
            rendered(&hg.time_series(0)),
            expected(&[
                ("latency_bucket", Some("1"), 0.0),
                ("latency_bucket", Some("2"), 0.0),
                ("latency_bucket", Some("+Inf"), 1.0),
                ("latency_sum", None, 99.0),
                ("latency_count", None, 1.0),
            ])
        );
    }

    #[test]
    fn buckets_are_monotonic_for_any_observations() {
        let bounds = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
        let hg = histogram(&bounds);
        let mut sum = 0.0;
        let mut n = 0u32;
        let mut x: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            // xorshift
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let value = (x % 20_000) as f64 / 1000.0;
            hg.observe(&["a", "b"], value).unwrap();
            sum += value;
            n += 1;
        }

        let series = hg.time_series(0);
        let buckets = series
            .iter()
            .filter(|ts| ts.label("__name__") == Some("latency_bucket"))
            .map(|ts| ts.samples[0].value)
            .collect::<Vec<_>>();
        assert_eq!(buckets.len(), bounds.len() + 1);
        assert!(buckets.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(buckets.last().copied(), Some(n as f64));
        assert_eq!(hg.count(&["a", "b"]).unwrap(), n as f64);
        assert!((hg.sum(&["a", "b"]).unwrap() - sum).abs() < 1e-6);
    }

    #[test]
    fn nan_only_reaches_inf_and_count() {
        let hg = histogram(&[1.0, 2.0]);
        hg.observe(&["a", "b"], f64::NAN).unwrap();
        assert_eq!(hg.bucket_value(&["a", "b"], 1.0).unwrap(), 0.0);
        assert_eq!(hg.bucket_value(&["a", "b"], 2.0).unwrap(), 0.0);
        assert_eq!(hg.bucket_value(&["a", "b"], f64::INFINITY).unwrap(), 1.0);
        assert_eq!(hg.count(&["a", "b"]).unwrap(), 1.0);
        assert!(hg.sum(&["a", "b"]).unwrap().is_nan());
    }

    #[test]
    fn bucket_for_boundaries() {
        let buckets = Buckets::new(vec![1.0, 2.0]).unwrap();
        assert_eq!(buckets.bucket_for(f64::NEG_INFINITY), Some(0));
        assert_eq!(buckets.bucket_for(1.0), Some(0));
        assert_eq!(buckets.bucket_for(1.5), Some(1));
        assert_eq!(buckets.bucket_for(2.0), Some(1));
        assert_eq!(buckets.bucket_for(2.5), None);
        assert_eq!(buckets.bucket_for(f64::INFINITY), None);
        assert_eq!(buckets.bucket_for(f64::NAN), None);
    }

    #[test]
    fn tuples_render_in_insertion_order() {
        let hg = histogram(&[1.0]);
        hg.observe(&["z", "z"], 0.5).unwrap();
        hg.observe(&["a", "a"], 0.5).unwrap();
        hg.observe(&["z", "z"], 0.5).unwrap();
        let series = hg.time_series(0);
        assert_eq!(series.len(), 8);
        assert!(series[..4].iter().all(|ts| ts.label("l1") == Some("z")));
        assert!(series[4..].iter().all(|ts| ts.label("l1") == Some("a")));
    }

    #[test]
    fn add_requires_a_configured_bound() {
        let hg = histogram(&[50.0, 100.0]);
        assert_eq!(
            hg.add(&["a", "b"], 1.0, 75.0),
            Err(MetricError::BucketNotFound(75.0))
        );
        assert_eq!(
            hg.add(&["a", "b"], 1.0, f64::INFINITY),
            Err(MetricError::BucketNotFound(f64::INFINITY))
        );
        // A rejected `add` does not record the tuple
        assert!(hg.time_series(0).is_empty());
    }

    #[test]
    fn mismatched_tuple_is_never_rendered() {
        let hg = histogram(&[1.0]);
        assert_eq!(
            hg.observe(&["a"], 1.0),
            Err(MetricError::SchemaMismatch { expected: 2, got: 1 })
        );
        assert!(hg.add_sum(&["a", "b", "c"], 1.0).is_err());
        assert!(hg.time_series(0).is_empty());
    }

    #[test]
    fn set_sum_and_count() {
        let hg = histogram(&[1.0]);
        hg.observe(&["a", "b"], 0.5).unwrap();
        hg.set_count(&["a", "b"], 10.0).unwrap();
        hg.set_sum(&["a", "b"], 4.0).unwrap();
        assert_eq!(hg.count(&["a", "b"]).unwrap(), 10.0);
        assert_eq!(hg.sum(&["a", "b"]).unwrap(), 4.0);
        assert_eq!(hg.bucket_value(&["a", "b"], f64::INFINITY).unwrap(), 10.0);
    }

    #[test]
    fn validates_buckets() {
        assert_eq!(Buckets::new(Vec::<f64>::new()).unwrap().bounds(), DEFAULT_BUCKETS);
        assert_eq!(
            Buckets::new(vec![1.0, 2.0, f64::INFINITY]).unwrap().bounds(),
            &[1.0, 2.0]
        );
        assert!(matches!(
            Buckets::new(vec![2.0, 1.0]),
            Err(MetricError::InvalidBuckets(_))
        ));
        assert!(matches!(
            Buckets::new(vec![1.0, 1.0]),
            Err(MetricError::InvalidBuckets(_))
        ));
        assert!(matches!(
            Buckets::new(vec![f64::NAN, 1.0]),
            Err(MetricError::InvalidBuckets(_))
        ));
        assert!(matches!(
            Buckets::new(vec![f64::NEG_INFINITY, 1.0]),
            Err(MetricError::InvalidBuckets(_))
        ));
    }

    #[test]
    fn rejects_reserved_bucket_label() {
        assert_eq!(
            Histogram::new("latency", "", &["le"], Buckets::default()).err(),
            Some(MetricError::InvalidLabel("le".into()))
        );
    }

    #[test]
    fn concurrent_observations() {
        let hg = Arc::new(histogram(&[1.0, 10.0]));
        let threads = (0..5)
            .map(|_| {
                let hg = Arc::clone(&hg);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        hg.observe(&["a", "b"], (i % 20) as f64).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(hg.count(&["a", "b"]).unwrap(), 1000.0);
        assert_eq!(hg.bucket_value(&["a", "b"], 1.0).unwrap(), 100.0);
        assert_eq!(hg.bucket_value(&["a", "b"], 10.0).unwrap(), 550.0);
    }

    #[test]
    fn renders_cumulative_buckets_while_observing() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let hg = Arc::new(histogram(&[1.0, 2.0, 5.0, 10.0]));
        hg.observe(&["a", "b"], 0.5).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let writers = (0..4)
            .map(|_| {
                let hg = Arc::clone(&hg);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut i = 0u64;
                    while !done.load(Ordering::Relaxed) {
                        hg.observe(&["a", "b"], (i % 12) as f64).unwrap();
                        i += 1;
                    }
                })
            })
            .collect::<Vec<_>>();

        for _ in 0..2000 {
            let buckets = hg
                .time_series(0)
                .iter()
                .filter(|ts| ts.label("__name__") == Some("latency_bucket"))
                .map(|ts| ts.samples[0].value)
                .collect::<Vec<_>>();
            assert_eq!(buckets.len(), 5);
            assert!(
                buckets.windows(2).all(|pair| pair[0] <= pair[1]),
                "buckets not cumulative: {:?}",
                buckets
            );
        }

        done.store(true, Ordering::Relaxed);
        for writer in writers {
            writer.join().unwrap();
        }
    }
}
