use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::warn;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder once per process and describe the upstream series.
    /// Returns `None` when another recorder already owns the process.
    pub fn init() -> Option<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe_counter!(
                    "upstream_requests_total",
                    "Upstream calls by provider and outcome."
                );
                describe_counter!(
                    "upstream_rate_limited_total",
                    "Rate-limit triggers by provider (exhausted | throttled)."
                );
                describe_counter!(
                    "rate_limit_sleep_secs_total",
                    "Seconds spent blocking before a retry."
                );
                describe_histogram!("upstream_fetch_ms", "Upstream call latency in milliseconds.");
                Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
            })
            .map_err(|e| warn!(error = %e, "prometheus recorder not installed"))
            .ok()?;
        Some(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
