//! quinn-backed dialer, link and frame sink.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::session::{Dialer, FrameSink, Link};
use crate::transport::{self, CloseCode};
use crate::{Result, TelemetryError};

const ACK_BUFFER_SIZE: usize = 1024;

/// Dials the collector over QUIC.
pub struct QuicDialer {
    endpoint: quinn::Endpoint,
    config: quinn::ClientConfig,
    address: String,
    server_name: String,
}

impl QuicDialer {
    /// Create a dialer with its own ephemeral endpoint.
    ///
    /// `address` is resolved on every dial so DNS changes are picked up between
    /// reconnects.
    pub fn new(
        config: quinn::ClientConfig,
        address: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Result<Self> {
        let address = address.into();
        let ipv6 = address.trim_start().starts_with('[');
        let endpoint = transport::client_endpoint(ipv6)?;
        Ok(Self { endpoint, config, address, server_name: server_name.into() })
    }

    /// Underlying endpoint, for shutdown.
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Dialer for QuicDialer {
    type Link = quinn::Connection;

    async fn dial(&self) -> Result<quinn::Connection> {
        let remote = tokio::net::lookup_host(&self.address)
            .await
            .map_err(|e| TelemetryError::dial_failed_with_source(&self.address, "lookup failed", e))?
            .next()
            .ok_or_else(|| TelemetryError::dial_failed(&self.address, "no addresses resolved"))?;

        let connecting = self
            .endpoint
            .connect_with(self.config.clone(), remote, &self.server_name)
            .map_err(|e| TelemetryError::dial_failed_with_source(&self.address, "connect", e))?;

        connecting
            .await
            .map_err(|e| TelemetryError::dial_failed_with_source(&self.address, "handshake", e))
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

#[async_trait]
impl Link for quinn::Connection {
    type Sink = QuicFrameSink;

    async fn open_stream(&self) -> Result<QuicFrameSink> {
        let (send, recv) = self.open_bi().await.map_err(|e| {
            TelemetryError::stream_open_failed("open_bi failed", Some(Box::new(e)))
        })?;
        Ok(QuicFrameSink::new(send, recv))
    }

    fn close(&self, code: CloseCode) {
        quinn::Connection::close(self, code.var_int(), code.reason());
    }

    fn remote(&self) -> String {
        self.remote_address().to_string()
    }
}

/// Send half of the session stream.
///
/// Acknowledgments arriving on the receive half are drained by a background
/// task so the collector's writes never stall on flow control.
pub struct QuicFrameSink {
    send: quinn::SendStream,
    ack_reader: JoinHandle<()>,
}

impl QuicFrameSink {
    fn new(send: quinn::SendStream, recv: quinn::RecvStream) -> Self {
        let ack_reader = tokio::spawn(drain_acks(recv));
        Self { send, ack_reader }
    }
}

#[async_trait]
impl FrameSink for QuicFrameSink {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.send.write_all(frame).await.map_err(|e| {
            TelemetryError::stream_write_failed("write to stream failed", Some(Box::new(e)))
        })
    }
}

impl Drop for QuicFrameSink {
    fn drop(&mut self) {
        let _ = self.send.finish();
        self.ack_reader.abort();
    }
}

async fn drain_acks(mut recv: quinn::RecvStream) {
    let mut buffer = vec![0u8; ACK_BUFFER_SIZE];
    loop {
        match recv.read(&mut buffer).await {
            Ok(Some(n)) => {
                debug!(ack = %String::from_utf8_lossy(&buffer[..n]), "Collector acknowledgment");
            }
            Ok(None) => {
                trace!("Acknowledgment stream finished");
                return;
            }
            Err(e) => {
                trace!(error = %e, "Acknowledgment stream ended");
                return;
            }
        }
    }
}
