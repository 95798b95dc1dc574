use serde::{Deserialize, Serialize};

/// Point-in-time view of the orchestrator's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// Percentage, 0 when no task has finished
    pub success_rate: f64,
    /// Mean duration of successful tasks, in milliseconds
    pub avg_execution_time: f64,
    pub active_sessions: usize,
}

/// Monotonic counters; there is no reset
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    total_tasks: u64,
    successful_tasks: u64,
    failed_tasks: u64,
    avg_execution_time: f64,
}

impl Metrics {
    pub(crate) fn record_success(&mut self, duration_ms: u64) {
        self.total_tasks += 1;
        self.successful_tasks += 1;
        let n = self.successful_tasks as f64;
        self.avg_execution_time = (self.avg_execution_time * (n - 1.0) + duration_ms as f64) / n;
    }

    pub(crate) fn record_failure(&mut self) {
        self.total_tasks += 1;
        self.failed_tasks += 1;
    }

    pub(crate) fn snapshot(&self, active_sessions: usize) -> MetricsSnapshot {
        let success_rate = if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64 * 100.0
        };

        MetricsSnapshot {
            total_tasks: self.total_tasks,
            successful_tasks: self.successful_tasks,
            failed_tasks: self.failed_tasks,
            success_rate,
            avg_execution_time: self.avg_execution_time,
            active_sessions,
        }
    }
}
