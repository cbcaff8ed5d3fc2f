//! Signal handling and ordered teardown

use std::fmt::Display;
use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use crate::domain::GracefulClose;

/// Result of the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    Failed,
}

impl ShutdownOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::Failed => ExitCode::FAILURE,
        }
    }
}

/// Resolves once, on the first SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Wait for the server to finish draining, then close each resource in
/// order. A failing step is logged and the remaining steps still run.
pub async fn drain_and_close<F, E>(server: F, resources: &[Arc<dyn GracefulClose>]) -> ShutdownOutcome
where
    F: IntoFuture<Output = Result<(), E>>,
    E: Display,
{
    let mut outcome = ShutdownOutcome::Clean;

    match server.await {
        Ok(()) => info!("HTTP server closed"),
        Err(e) => {
            error!(error = %e, "HTTP server failed");
            outcome = ShutdownOutcome::Failed;
        }
    }

    for resource in resources {
        match resource.close().await {
            Ok(()) => info!(resource = resource.name(), "Closed"),
            Err(e) => {
                error!(resource = resource.name(), error = %e, "Failed to close");
                outcome = ShutdownOutcome::Failed;
            }
        }
    }

    if outcome == ShutdownOutcome::Clean {
        info!("Shutdown complete");
    }

    outcome
}
