use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use saleflow_order::ReconciliationResult;

/// Prometheus view of reconciliation runs and the gateway calls they make
pub struct ApiMetrics {
    registry: Registry,
    gateway_calls: IntCounterVec,
    gateway_duration: HistogramVec,
    reconciliations: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let gateway_calls = IntCounterVec::new(
            Opts::new("saleflow_gateway_calls_total", "External gateway calls"),
            &["gateway", "operation", "outcome"],
        )?;
        let gateway_duration = HistogramVec::new(
            HistogramOpts::new("saleflow_gateway_call_duration_seconds", "External gateway call latency"),
            &["gateway", "operation"],
        )?;
        let reconciliations = IntCounterVec::new(
            Opts::new("saleflow_reconciliations_total", "Reconciliation runs by final state"),
            &["operation", "state"],
        )?;

        registry.register(Box::new(gateway_calls.clone()))?;
        registry.register(Box::new(gateway_duration.clone()))?;
        registry.register(Box::new(reconciliations.clone()))?;

        Ok(Self {
            registry,
            gateway_calls,
            gateway_duration,
            reconciliations,
        })
    }

    pub fn observe(&self, operation: &str, result: &ReconciliationResult) {
        self.reconciliations
            .with_label_values(&[operation, result.state.as_str()])
            .inc();

        for call in result.metrics.calls() {
            self.gateway_calls
                .with_label_values(&[call.gateway, call.operation, call.outcome.as_str()])
                .inc();
            self.gateway_duration
                .with_label_values(&[call.gateway, call.operation])
                .observe(call.duration.as_secs_f64());
        }
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saleflow_order::metrics::CallOutcome;
    use saleflow_order::ReconcileState;
    use std::time::Instant;

    #[test]
    fn test_observe_run() {
        let metrics = ApiMetrics::new().unwrap();

        let mut result = ReconciliationResult::new();
        result.metrics.record("planning", "request_allocation", Instant::now(), CallOutcome::Ok);
        result.metrics.record("erp", "create_order", Instant::now(), CallOutcome::Rejected);
        result.enter(ReconcileState::Done);
        metrics.observe("create_order", &result);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"saleflow_reconciliations_total{operation="create_order",state="DONE"} 1"#));
        assert!(text.contains(r#"gateway="erp",operation="create_order",outcome="rejected""#));
        assert!(text.contains("saleflow_gateway_call_duration_seconds_bucket"));
    }
}
