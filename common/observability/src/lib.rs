use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

#[derive(Clone)]
pub struct ReimbursementMetrics {
    pub registry: Registry,
    pub performed_total: IntCounter,
    pub incomplete_total: IntCounter,
    pub refunds_created_total: IntCounter,
    pub exchange_units_total: IntCounter,
    pub commit_conflicts_total: IntCounter,
    pub notify_failures_total: IntCounter,
    pub perform_duration_seconds: Histogram,
}

impl ReimbursementMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let performed_total = IntCounter::new(
            "reimbursements_performed_total",
            "Reimbursements performed to completion",
        ).unwrap();
        let incomplete_total = IntCounter::new(
            "reimbursements_incomplete_total",
            "Perform attempts aborted because payments could not cover the total",
        ).unwrap();
        let refunds_created_total = IntCounter::new(
            "reimbursement_refunds_created_total",
            "Refund records committed by reimbursements",
        ).unwrap();
        let exchange_units_total = IntCounter::new(
            "reimbursement_exchange_units_total",
            "Exchange inventory units added to exchange shipments",
        ).unwrap();
        let commit_conflicts_total = IntCounter::new(
            "reimbursement_commit_conflicts_total",
            "Unit-of-work commits rejected because payment capacity moved",
        ).unwrap();
        let notify_failures_total = IntCounter::new(
            "reimbursement_notify_failures_total",
            "Post-commit notification failures",
        ).unwrap();
        let perform_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "reimbursement_perform_duration_seconds",
                "Wall time of a perform call including commit"
            ).buckets(vec![0.001,0.005,0.01,0.05,0.1,0.25,0.5,1.0])
        ).unwrap();
        let _ = registry.register(Box::new(performed_total.clone()));
        let _ = registry.register(Box::new(incomplete_total.clone()));
        let _ = registry.register(Box::new(refunds_created_total.clone()));
        let _ = registry.register(Box::new(exchange_units_total.clone()));
        let _ = registry.register(Box::new(commit_conflicts_total.clone()));
        let _ = registry.register(Box::new(notify_failures_total.clone()));
        let _ = registry.register(Box::new(perform_duration_seconds.clone()));
        ReimbursementMetrics {
            registry,
            performed_total,
            incomplete_total,
            refunds_created_total,
            exchange_units_total,
            commit_conflicts_total,
            notify_failures_total,
            perform_duration_seconds,
        }
    }

    /// Text exposition of every registered family.
    pub fn render(&self) -> String {
        use prometheus::{Encoder, TextEncoder};
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            return format!("# metrics encode error: {e}\n");
        }
        String::from_utf8_lossy(&buf).to_string()
    }
}

impl Default for ReimbursementMetrics {
    fn default() -> Self { Self::new() }
}
