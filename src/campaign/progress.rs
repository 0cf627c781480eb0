use super::TargetRecord;
use serde::Serialize;

/// Derived from the current records on every read; never stored or merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn from_records(records: &[TargetRecord]) -> Self {
        let mut progress = Progress::default();

        for record in records.iter().filter(|r| !r.is_caller()) {
            progress.total += 1;
            if record.call_status.is_settled() {
                progress.completed += 1;
            }
        }

        progress
    }

    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f32 / self.total as f32) * 100.0
        }
    }

    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}
