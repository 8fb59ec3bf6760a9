//! Usage ledger for generated endpoints
//!
//! Resource figures are approximations: CPU time is taken to equal the
//! measured wall-clock latency and memory is `max(0.1, rows / 1000)` MB per call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory charged to a call that touches no rows
pub const MIN_MEMORY_MB: f64 = 0.1;

/// Approximate memory cost of serving `rows` records
pub fn approximate_memory_mb(rows: usize) -> f64 {
    (rows as f64 / 1000.0).max(MIN_MEMORY_MB)
}

/// Running aggregate of an endpoint's traffic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds
    pub total_cpu_time: f64,
    /// MB
    pub total_memory_used: f64,
    /// Milliseconds, averaged over requests that reported a latency
    pub average_response_time: f64,
    /// Requests that contributed to `average_response_time`
    #[serde(default)]
    pub timed_requests: u64,
}

/// One served or reported call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub success: bool,
    pub response_time_ms: Option<f64>,
    pub cpu_time_ms: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub error_message: Option<String>,
}

impl UsageEvent {
    /// Successful prediction over `rows` records
    pub fn success(response_time_ms: f64, rows: usize) -> Self {
        Self {
            success: true,
            response_time_ms: Some(response_time_ms),
            cpu_time_ms: Some(response_time_ms),
            memory_used_mb: Some(approximate_memory_mb(rows)),
            error_message: None,
        }
    }

    /// Failure after validation; contributes no latency or resource cost
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            response_time_ms: None,
            cpu_time_ms: None,
            memory_used_mb: None,
            error_message: Some(message.into()),
        }
    }

    /// Name the first measurement that is negative or not finite
    pub fn invalid_measurement(&self) -> Option<&'static str> {
        [
            ("response_time_ms", self.response_time_ms),
            ("cpu_time_ms", self.cpu_time_ms),
            ("memory_used_mb", self.memory_used_mb),
        ]
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| !v.is_finite() || v < 0.0))
        .map(|(field, _)| field)
    }
}

impl UsageMetrics {
    pub fn record_success(&mut self, response_time_ms: f64, cpu_time_ms: f64, memory_used_mb: f64) {
        self.record_event(&UsageEvent {
            success: true,
            response_time_ms: Some(response_time_ms),
            cpu_time_ms: Some(cpu_time_ms),
            memory_used_mb: Some(memory_used_mb),
            error_message: None,
        });
    }

    pub fn record_failure(&mut self) {
        self.record_event(&UsageEvent::failure(""));
    }

    /// Fold one event into the aggregate.
    ///
    /// The average is `((old_avg * old_count) + latency) / new_count` over
    /// latency-bearing events only.
    pub fn record_event(&mut self, event: &UsageEvent) {
        self.total_requests += 1;
        if event.success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        if let Some(cpu_ms) = event.cpu_time_ms {
            self.total_cpu_time += cpu_ms / 1000.0;
        }
        if let Some(memory_mb) = event.memory_used_mb {
            self.total_memory_used += memory_mb;
        }
        if let Some(latency) = event.response_time_ms {
            let old_count = self.timed_requests as f64;
            self.timed_requests += 1;
            self.average_response_time =
                (self.average_response_time * old_count + latency) / self.timed_requests as f64;
        }
    }

    /// Fraction of requests that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Stored record of one endpoint call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: Option<f64>,
    pub cpu_time_ms: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub error_message: Option<String>,
}

impl UsageLogEntry {
    pub fn from_event(event: &UsageEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            success: event.success,
            response_time_ms: event.response_time_ms,
            cpu_time_ms: event.cpu_time_ms,
            memory_used_mb: event.memory_used_mb,
            error_message: event.error_message.clone(),
        }
    }
}
