//! web-watcher: binary entrypoint.
//! Loads the config, wires fetcher, snapshot store and notification channels,
//! then runs the scheduler until Ctrl-C / SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use web_watcher::config::{self, loader};
use web_watcher::fetch::{build_client, HttpFetcher};
use web_watcher::logging::{self, LogFormat};
use web_watcher::metrics::Metrics;
use web_watcher::notify::email::SmtpMailer;
use web_watcher::notify::webhook::HttpWebhook;
use web_watcher::notify::{Dispatcher, MailChannel};
use web_watcher::{scheduler, FileStore, Pipeline, RetryController, RetryPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    logging::init(LogFormat::from_env())?;

    let path = loader::config_path_from_env();
    let settings = match config::load(&path) {
        Ok(s) => s,
        Err(e) => {
            error!(path = %path.display(), error = %e, "invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        path = %path.display(),
        watches = settings.watches.len(),
        enabled = settings.enabled_watches().len(),
        "configuration loaded"
    );

    if let Some(listen) = settings.metrics_listen.clone() {
        let metrics = Metrics::init()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(&listen).await {
                error!(error = %format!("{e:#}"), "metrics endpoint stopped");
            }
        });
    }

    let client = build_client(settings.timeout, settings.proxy.as_ref())?;
    let fetcher = Arc::new(HttpFetcher::with_client(client.clone(), &settings.useragent));
    let webhook = Arc::new(HttpWebhook::new(client, &settings.useragent));

    let mail = match &settings.mail {
        Some(cfg) => Some(MailChannel {
            transport: Arc::new(SmtpMailer::from_config(cfg).context("smtp transport")?),
            to: cfg.to.clone(),
            attempts: cfg.retries,
            retry_delay: cfg.retry_delay,
        }),
        None => {
            warn!("no mail section configured, only webhooks will be notified");
            None
        }
    };

    let store = Arc::new(
        FileStore::open(&settings.snapshot_dir)
            .await
            .with_context(|| format!("open snapshot dir {}", settings.snapshot_dir))?,
    );

    let mut retry = RetryController::new(
        fetcher,
        RetryPolicy {
            count: settings.retry_count,
            delay: settings.retry_delay,
        },
    );
    if let Some(max) = settings.max_concurrent_fetches {
        retry = retry.with_fetch_limit(max);
    }

    let pipeline = Arc::new(Pipeline::new(
        retry,
        store,
        Dispatcher::new(mail, webhook),
    ));
    let handle = scheduler::start(pipeline, settings.enabled_watches());

    wait_for_signal().await;
    info!(graceful = ?settings.graceful_timeout, "shutting down");
    handle.shutdown(settings.graceful_timeout).await;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "ctrl-c handler failed");
    }
}
