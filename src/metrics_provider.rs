use std::sync::LazyLock;

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry as PrometheusRegistry, TextEncoder,
};
use tracing::error;

use crate::server::error::Error;

pub static METRICS_PROVIDER: LazyLock<MetricsProvider> = LazyLock::new(|| {
    MetricsProvider::new().unwrap_or_else(|error| {
        error!("Unable to create metrics provider: {error}");
        std::process::exit(1);
    })
});

pub struct MetricsProvider {
    registry: PrometheusRegistry,
    pub http_requests_total: IntCounter,
    pub auth_attempts: IntCounterVec,
}

impl MetricsProvider {
    pub fn new() -> Result<Self, Error> {
        let registry = PrometheusRegistry::new();

        let http_requests_total = register_int_counter_with_registry!(
            "http_requests_total",
            "Total number of HTTP requests made.",
            &registry
        )
        .map_err(|error| {
            Error::Initialization(format!("Unable to create http_requests_total metric: {error}"))
        })?;

        let auth_attempts = register_int_counter_vec_with_registry!(
            "auth_attempts_total",
            "Authentication attempts by scheme and outcome.",
            &["scheme", "outcome"],
            &registry
        )
        .map_err(|error| {
            Error::Initialization(format!("Unable to create auth_attempts metric: {error}"))
        })?;

        Ok(Self {
            registry,
            http_requests_total,
            auth_attempts,
        })
    }

    pub fn gather(&self) -> Result<(String, Vec<u8>), Error> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|error| Error::Internal(format!("Unable to encode metrics: {error}")))?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
