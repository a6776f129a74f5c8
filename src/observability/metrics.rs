use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounter,
    pub status_transitions_total: IntCounterVec,
    pub settlements_total: IntCounterVec,
    pub assistant_replies_total: IntCounterVec,
    pub fleet_markers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total = IntCounter::new(
            "deliveries_created_total",
            "Total deliveries created",
        )
        .expect("valid deliveries_created_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Delivery status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let settlements_total = IntCounterVec::new(
            Opts::new("settlements_total", "Commission settlements by outcome"),
            &["outcome"],
        )
        .expect("valid settlements_total metric");

        let assistant_replies_total = IntCounterVec::new(
            Opts::new("assistant_replies_total", "Assistant replies by outcome"),
            &["outcome"],
        )
        .expect("valid assistant_replies_total metric");

        let fleet_markers = IntGauge::new("fleet_markers", "Current number of live fleet markers")
            .expect("valid fleet_markers metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(settlements_total.clone()))
            .expect("register settlements_total");
        registry
            .register(Box::new(assistant_replies_total.clone()))
            .expect("register assistant_replies_total");
        registry
            .register(Box::new(fleet_markers.clone()))
            .expect("register fleet_markers");

        Self {
            registry,
            deliveries_created_total,
            status_transitions_total,
            settlements_total,
            assistant_replies_total,
            fleet_markers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
