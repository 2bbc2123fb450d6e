//! Transport session: one connection, one outbound stream.
//!
//! A session moves `Connecting → Connected → Closed` exactly once. Any error on
//! dial, stream open or write closes it; a closed session is never reused, the
//! reconnector builds a new one.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::CloseCode;
use crate::{Result, TelemetryError};

/// Establishes connections to the collector.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connection type produced by a successful dial
    type Link: Link;

    /// Dial the collector once.
    async fn dial(&self) -> Result<Self::Link>;

    /// Address being dialed, for logging
    fn address(&self) -> String;
}

/// An established, multiplexed connection.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Outbound stream type
    type Sink: FrameSink;

    /// Open one bidirectional stream, waiting for flow-control credit.
    async fn open_stream(&self) -> Result<Self::Sink>;

    /// Close the connection with an application error code.
    fn close(&self, code: CloseCode);

    /// Peer address, for logging
    fn remote(&self) -> String;
}

/// Write half of a stream carrying frames.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one frame in a single stream write.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()>;
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Closed,
}

/// One logical connection to the collector.
pub struct TransportSession<L: Link> {
    state: SessionState,
    link: Option<(L, L::Sink)>,
}

impl<L: Link> Default for TransportSession<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Link> TransportSession<L> {
    /// A fresh session in the `Connecting` state.
    pub fn new() -> Self {
        Self { state: SessionState::Connecting, link: None }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Dial and open the session's single stream.
    ///
    /// Cancellation during either step returns [`TelemetryError::Cancelled`].
    pub async fn connect<D>(&mut self, dialer: &D, cancel: &CancellationToken) -> Result<()>
    where
        D: Dialer<Link = L>,
    {
        if self.state != SessionState::Connecting {
            return Err(TelemetryError::SessionClosed);
        }

        info!(address = %dialer.address(), "Attempting to connect to collector");
        let dialed = tokio::select! {
            _ = cancel.cancelled() => Err(TelemetryError::Cancelled),
            result = dialer.dial() => result,
        };
        let link = match dialed {
            Ok(link) => link,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let opened = tokio::select! {
            _ = cancel.cancelled() => Err(TelemetryError::Cancelled),
            result = link.open_stream() => result,
        };
        match opened {
            Ok(sink) => {
                info!(remote = %link.remote(), "Connected to collector");
                self.link = Some((link, sink));
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                let code = if e.is_cancelled() { CloseCode::Normal } else { CloseCode::SessionError };
                link.close(code);
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Write one frame. A failed write closes the session.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let Some((_, sink)) = self.link.as_mut() else {
            return Err(TelemetryError::SessionClosed);
        };

        if let Err(e) = sink.write_frame(frame).await {
            warn!(error = %e, "Stream write failed, closing session");
            self.close(CloseCode::SessionError);
            return Err(e);
        }
        Ok(())
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self, code: CloseCode) {
        if let Some((link, _sink)) = self.link.take() {
            debug!(remote = %link.remote(), ?code, "Closing session");
            link.close(code);
        }
        self.state = SessionState::Closed;
    }
}

impl<L: Link> Drop for TransportSession<L> {
    fn drop(&mut self) {
        self.close(CloseCode::Normal);
    }
}
