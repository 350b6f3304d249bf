use std::collections::BTreeMap;
use std::time::Instant;

/// Accumulates wall-clock milliseconds per named bucket for one job execution.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    results: BTreeMap<String, f64>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time<T>(&mut self, bucket: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        *self.results.entry(bucket.to_string()).or_insert(0.0) += elapsed_ms;
        value
    }

    pub fn results(&self) -> &BTreeMap<String, f64> {
        &self.results
    }
}
