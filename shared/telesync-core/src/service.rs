//! Service lifecycle shared by Telesync binaries
//!
//! A binary implements [`TelesyncService`] and hands it to
//! [`ServiceRuntime::run`], which starts it, waits for either its exit or a
//! shutdown signal, and then stops it within the configured grace period.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{CoreError, Result};

/// Liveness report served on `/health`
#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// One dependency the service needs before it can serve traffic
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessCheck {
    pub name: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReadinessCheck {
    pub fn new(name: &'static str, ok: bool) -> Self {
        Self {
            name,
            ok,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Readiness report served on `/ready`; ready only when every check passes
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub checks: Vec<ReadinessCheck>,
}

impl Readiness {
    pub fn from_checks(checks: Vec<ReadinessCheck>) -> Self {
        Self {
            ready: checks.iter().all(|c| c.ok),
            checks,
        }
    }
}

#[async_trait]
pub trait TelesyncService: Send + Sync + 'static {
    /// Service identifier (e.g., "live-chart")
    fn service_id(&self) -> &'static str;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn started_at(&self) -> Instant;

    fn liveness(&self) -> Liveness {
        Liveness {
            service: self.service_id(),
            version: self.version(),
            uptime_secs: self.started_at().elapsed().as_secs(),
        }
    }

    fn readiness(&self) -> Readiness;

    /// Run the service until it finishes or is stopped
    async fn start(self: Arc<Self>) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}

pub struct ServiceRuntime;

impl ServiceRuntime {
    /// Run `service` until it exits or the process receives Ctrl-C / SIGTERM
    pub async fn run<S: TelesyncService>(service: Arc<S>, config: &ServiceConfig) -> Result<()> {
        Self::run_until(service, config, shutdown_signal()).await
    }

    /// Run `service` until it exits or `shutdown` resolves.
    ///
    /// Returns the service's own error when it stops by itself with one.
    pub async fn run_until<S, F>(service: Arc<S>, config: &ServiceConfig, shutdown: F) -> Result<()>
    where
        S: TelesyncService,
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        info!(
            service_id = service.service_id(),
            version = service.version(),
            service_name = %config.service_name,
            "Starting service"
        );

        let mut task = tokio::spawn(service.clone().start());

        let outcome = tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(())) => {
                    info!("Service exited");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Service failed");
                    Err(e)
                }
                Err(e) => Err(CoreError::Service(format!("service task ended abnormally: {}", e))),
            },
            _ = shutdown => {
                info!("Shutdown signal received, stopping");
                Ok(())
            }
        };

        match tokio::time::timeout(config.shutdown_grace, service.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Error during shutdown"),
            Err(_) => warn!(
                grace_secs = config.shutdown_grace.as_secs(),
                "Shutdown did not finish within the grace period"
            ),
        }
        task.abort();

        info!(uptime_secs = started.elapsed().as_secs(), "Service stopped");
        outcome
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
