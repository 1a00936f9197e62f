//! Periodic liveness probing of the current session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use yamato_core::{error::YamatoError, traits::Session};

use super::machine::{Input, ProbeFailure};
use super::manager::Command;

/// Spawn the monitor. It stops on its own after reporting a closed socket
/// and is aborted by the manager on cleanup.
pub(crate) fn spawn(
    session: Arc<dyn Session>,
    interval: Duration,
    probe_timeout: Duration,
    report: mpsc::Sender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let failure = match tokio::time::timeout(probe_timeout, session.probe()).await {
                Ok(Ok(())) => {
                    debug!("health check ok");
                    continue;
                }
                Ok(Err(YamatoError::SocketClosed)) => ProbeFailure::SocketClosed,
                Ok(Err(e)) => ProbeFailure::Other(e.to_string()),
                Err(_) => ProbeFailure::Other(format!(
                    "probe timed out after {}s",
                    probe_timeout.as_secs()
                )),
            };

            let closed = failure == ProbeFailure::SocketClosed;
            if report
                .send(Command::Input(Input::ProbeFailed(failure)))
                .await
                .is_err()
                || closed
            {
                break;
            }
        }
    })
}
