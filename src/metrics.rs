// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static DESCRIBED: OnceCell<()> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Recorder that is not installed globally; used by tests.
    pub fn detached() -> (Self, metrics_exporter_prometheus::PrometheusRecorder) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (Self { handle }, recorder)
    }

    /// `/metrics` in the Prometheus exposition format.
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

    pub async fn serve(self, listen: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .with_context(|| format!("bind metrics listener on {listen}"))?;
        info!(listen, "metrics endpoint listening");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}

fn describe() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(
            "watch_invocations_total",
            "Watch invocations by terminal outcome"
        );
        describe_counter!("watch_fetch_attempts_total", "HTTP fetch attempts");
        describe_counter!(
            "watch_triggers_skipped_total",
            "Triggers skipped because the previous invocation was still running"
        );
        describe_histogram!(
            "watch_fetch_duration_ms",
            Unit::Milliseconds,
            "Fetch latency"
        );
        describe_counter!(
            "notify_deliveries_total",
            "Notification deliveries by channel and result"
        );
    });
}
