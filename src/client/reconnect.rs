//! Reconnection control loop.
//!
//! The reconnector owns the current [`TransportSession`] outright. Each attempt
//! builds a new session, runs the batch assembler on it until it fails, then
//! sleeps for the next backoff delay. There is no retry budget: the loop ends
//! only when the cancellation token fires, at which point the live session is
//! closed with [`CloseCode::Normal`] before [`Reconnector::run`] returns.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::assembler::BatchAssembler;
use super::session::{Dialer, TransportSession};
use crate::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::transport::CloseCode;
use crate::{Result, TelemetryError};

type RetryNotify = Arc<dyn Fn(&TelemetryError, Duration) + Send + Sync>;

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectSummary {
    /// Sessions started (dial attempts)
    pub attempts: u64,
    /// Sessions that reached `Connected`
    pub connections: u64,
}

/// Backoff-driven session supervisor.
pub struct Reconnector<D: Dialer> {
    dialer: D,
    assembler: BatchAssembler,
    policy: BackoffPolicy,
    notify: Option<RetryNotify>,
}

impl<D: Dialer> Reconnector<D> {
    pub fn new(dialer: D, assembler: BatchAssembler, policy: BackoffPolicy) -> Self {
        Self { dialer, assembler, policy, notify: None }
    }

    /// Observe every failed attempt with its cause and the delay before the
    /// next one. Called after the failure is logged.
    pub fn with_notify<F>(mut self, notify: F) -> Self
    where
        F: Fn(&TelemetryError, Duration) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(notify));
        self
    }

    /// Run on a new task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<ReconnectSummary> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Retry sessions until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> ReconnectSummary {
        let mut backoff = ExponentialBackoff::new(self.policy);
        let mut summary = ReconnectSummary::default();

        info!(address = %self.dialer.address(), "Reconnector started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            summary.attempts += 1;
            let mut session = TransportSession::new();
            let result = self.run_session(&mut session, &mut backoff, &mut summary, &cancel).await;

            let err = match result {
                Ok(never) => match never {},
                Err(e) if e.is_cancelled() => {
                    session.close(CloseCode::Normal);
                    break;
                }
                Err(e) => e,
            };
            drop(session);

            let delay = backoff.next_delay();
            error!(
                error = %err,
                retry_in = ?delay,
                attempt = summary.attempts,
                "Connection failed, retrying"
            );
            if let Some(notify) = &self.notify {
                notify(&err, delay);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            attempts = summary.attempts,
            connections = summary.connections,
            "Client shutdown initiated, reconnector stopped"
        );
        summary
    }

    async fn run_session(
        &self,
        session: &mut TransportSession<D::Link>,
        backoff: &mut ExponentialBackoff,
        summary: &mut ReconnectSummary,
        cancel: &CancellationToken,
    ) -> Result<Infallible> {
        session.connect(&self.dialer, cancel).await?;

        summary.connections += 1;
        backoff.reset();

        self.assembler.run(session, cancel).await
    }
}
