//! Numeric storage behind a single labeled series.
//!
//! Every value is an `f64` stored in an `AtomicU64`, so call sites on many
//! threads can update the same series without taking the instrument's lock.
//! Writes are `Release` and reads `Acquire`: a reader that sees a write also
//! sees every value the writer stored before it.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` that supports lock-free concurrent updates.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        AtomicF64(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    pub fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// The operations shared by every accumulator kind.
///
/// The kind is chosen when the instrument is built (`Counter` stores
/// `CounterValue`, `Gauge` stores `GaugeValue`), never by inspecting it later.
pub trait Value: Default + Send + Sync + 'static {
    fn add(&self, delta: f64);
    fn set(&self, value: f64);
    fn get(&self) -> f64;

    fn inc(&self) {
        self.add(1.0);
    }
}

/// Cumulative value. Deltas are not checked for sign.
#[derive(Debug, Default)]
pub struct CounterValue(AtomicF64);

impl Value for CounterValue {
    #[inline]
    fn add(&self, delta: f64) {
        self.0.add(delta);
    }

    /// Overwrites the running total, e.g. when importing a pre-aggregated count.
    #[inline]
    fn set(&self, value: f64) {
        self.0.set(value);
    }

    #[inline]
    fn get(&self) -> f64 {
        self.0.get()
    }
}

/// Point-in-time value that can move in either direction.
#[derive(Debug, Default)]
pub struct GaugeValue(AtomicF64);

impl GaugeValue {
    pub fn sub(&self, delta: f64) {
        self.0.add(-delta);
    }

    pub fn dec(&self) {
        self.sub(1.0);
    }
}

impl Value for GaugeValue {
    #[inline]
    fn add(&self, delta: f64) {
        self.0.add(delta);
    }

    #[inline]
    fn set(&self, value: f64) {
        self.0.set(value);
    }

    #[inline]
    fn get(&self) -> f64 {
        self.0.get()
    }
}
