use std::collections::HashMap;

/// Per-operation outcome counters (`"tick"`, `"resync"`, `"launch"`, ...).
#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    success_counts: HashMap<&'static str, u64>,
    failure_counts: HashMap<&'static str, u64>,
    skipped_ticks: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, operation: &'static str) {
        *self.success_counts.entry(operation).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, operation: &'static str) {
        *self.failure_counts.entry(operation).or_insert(0) += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped_ticks += 1;
    }

    pub fn get_success_count(&self, operation: &str) -> u64 {
        *self.success_counts.get(operation).unwrap_or(&0)
    }

    pub fn get_failure_count(&self, operation: &str) -> u64 {
        *self.failure_counts.get(operation).unwrap_or(&0)
    }

    pub fn get_skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    pub fn get_success_rate(&self, operation: &str) -> f32 {
        let success = self.get_success_count(operation) as f32;
        let total = success + self.get_failure_count(operation) as f32;

        if total == 0.0 {
            0.0
        } else {
            success / total
        }
    }
}
