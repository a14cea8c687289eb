use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Ok,
    /// The system answered but refused the request
    Rejected,
    Error,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Ok => "ok",
            CallOutcome::Rejected => "rejected",
            CallOutcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayCall {
    pub gateway: &'static str,
    pub operation: &'static str,
    pub duration: Duration,
    pub outcome: CallOutcome,
}

/// Timings of every external call made during one reconciliation run.
/// Handed back with the result; the caller decides where they go.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsCollector {
    calls: Vec<GatewayCall>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, gateway: &'static str, operation: &'static str, started: Instant, outcome: CallOutcome) {
        self.calls.push(GatewayCall {
            gateway,
            operation,
            duration: started.elapsed(),
            outcome,
        });
    }

    pub fn calls(&self) -> &[GatewayCall] {
        &self.calls
    }

    pub fn count(&self, gateway: &str, operation: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.gateway == gateway && c.operation == operation)
            .count()
    }

    pub fn total_duration(&self, gateway: &str) -> Duration {
        self.calls
            .iter()
            .filter(|c| c.gateway == gateway)
            .map(|c| c.duration)
            .sum()
    }

    pub fn merge(&mut self, other: MetricsCollector) {
        self.calls.extend(other.calls);
    }
}
