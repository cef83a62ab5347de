use arc_swap::ArcSwap;
use indexmap::{Equivalent, IndexMap}; // hash table w/ fast iter preserving insertion order
use parking_lot::Mutex;
use std::sync::Arc;

use crate::debug::DEBUG;
use crate::error::{MetricError, Result};
use crate::series::METRIC_NAME_LABEL;

/// One recorded label-value tuple and the state accumulated for it.
#[derive(Debug)]
pub struct Entry<V> {
    label_values: Vec<String>,
    value: V,
}

impl<V> Entry<V> {
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

/// A fixed list of label names, and every tuple of label values observed for them.
///
/// New tuples are inserted under a per-vector lock; values are updated through
/// the returned `Entry` without holding it. Flushes read a snapshot of the
/// recorded tuples, so a value changed while a flush is rendering may or may
/// not be included in that flush.
pub struct LabelVector<V> {
    name: String,
    help: String,
    labels: Vec<String>,

    /// A map of label values to their entry; for bookkeeping.
    ///
    /// Holding this lock is required to record a new tuple.
    map: Mutex<IndexMap<Vec<String>, Arc<Entry<V>>>>,

    /// The recorded entries in insertion order, that can be read from by
    /// multiple threads without acquiring a lock.
    list: ArcSwap<Vec<Arc<Entry<V>>>>,
}

impl<V> LabelVector<V> {
    /// Validates the metric and label names.
    ///
    /// `reserved` lists label names the instrument adds itself (e.g. `le`).
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[&str],
        reserved: &[&str],
    ) -> Result<Self> {
        let name = name.into();
        if !is_valid_metric_name(&name) {
            return Err(MetricError::InvalidName(name));
        }
        for (i, label) in labels.iter().enumerate() {
            if !is_valid_label_name(label)
                || *label == METRIC_NAME_LABEL
                || reserved.contains(label)
                || labels[..i].contains(label)
            {
                return Err(MetricError::InvalidLabel(label.to_string()));
            }
        }
        Ok(LabelVector {
            name,
            help: help.into(),
            labels: labels.iter().map(|label| label.to_string()).collect(),
            map: Mutex::new(IndexMap::new()),
            list: ArcSwap::new(Arc::new(Vec::new())),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.list.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.load().is_empty()
    }

    /// The recorded entries, in the order their tuples were first used.
    pub fn entries(&self) -> Arc<Vec<Arc<Entry<V>>>> {
        self.list.load_full()
    }

    /// Every recorded tuple of label values, in insertion order.
    pub fn label_values(&self) -> Vec<Vec<String>> {
        self.list
            .load()
            .iter()
            .map(|entry| entry.label_values.clone())
            .collect()
    }

    /// Get the entry for `label_values`, recording the tuple on first use.
    ///
    /// Recording a tuple copies the snapshot list, so first use is O(n) in the
    /// number of recorded tuples. Updates to an existing tuple never touch the list.
    pub fn get_or_create<F>(&self, label_values: &[&str], init: F) -> Result<Arc<Entry<V>>>
    where
        F: FnOnce() -> V,
    {
        self.check_len(label_values)?;

        let mut map = self.map.lock();
        if let Some(entry) = map.get(&LabelKey(label_values)) {
            return Ok(Arc::clone(entry));
        }
        let owned = label_values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let entry = Arc::new(Entry {
            label_values: owned.clone(),
            value: init(),
        });
        map.insert(owned, Arc::clone(&entry));
        let mut list = Vec::clone(&self.list.load());
        list.push(Arc::clone(&entry));
        self.list.store(Arc::new(list));
        DEBUG.series_added();

        // Release lock only after updating `list`.
        std::mem::drop(map);

        Ok(entry)
    }

    /// Get the entry for `label_values` without recording it.
    pub fn get(&self, label_values: &[&str]) -> Result<Arc<Entry<V>>> {
        self.check_len(label_values)?;
        self.map
            .lock()
            .get(&LabelKey(label_values))
            .cloned()
            .ok_or_else(|| {
                MetricError::NotFound(label_values.iter().map(|v| v.to_string()).collect())
            })
    }

    /// Forget every recorded tuple along with its accumulated state.
    ///
    /// Updates made through an `Entry` obtained before the reset are lost.
    pub fn reset(&self) {
        let mut map = self.map.lock();
        DEBUG.series_removed(map.len());
        map.clear();
        self.list.store(Arc::new(Vec::new()));
    }

    fn check_len(&self, label_values: &[&str]) -> Result<()> {
        if label_values.len() == self.labels.len() {
            return Ok(());
        }
        DEBUG.observation_rejected();
        tracing::warn!(
            metric = %self.name,
            expected = self.labels.len(),
            got = label_values.len(),
            "labels and label values do not match"
        );
        Err(MetricError::SchemaMismatch {
            expected: self.labels.len(),
            got: label_values.len(),
        })
    }
}

/// Borrowed lookup key; hashes exactly like the owned `Vec<String>` key.
#[derive(Hash)]
struct LabelKey<'a>(&'a [&'a str]);

impl Equivalent<Vec<String>> for LabelKey<'_> {
    fn equivalent(&self, key: &Vec<String>) -> bool {
        self.0.len() == key.len() && self.0.iter().zip(key).all(|(a, b)| *a == b.as_str())
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' || ch == ':' => (),
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => (),
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
