//! quinn-backed listener and inbound connection.

use std::net::SocketAddr;

use async_trait::async_trait;
use quinn::{ConnectionError, VarInt};
use tracing::debug;

use super::acceptor::{InboundConnection, InboundStream, Listener, PendingConnection};
use crate::transport::CloseCode;
use crate::{Result, TelemetryError};

/// Accepts QUIC connections from a server endpoint.
pub struct QuicListener {
    endpoint: quinn::Endpoint,
}

impl QuicListener {
    pub fn new(endpoint: quinn::Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }
}

#[async_trait]
impl Listener for QuicListener {
    type Pending = quinn::Incoming;

    async fn accept(&mut self) -> Result<Option<quinn::Incoming>> {
        // `None` only once the endpoint has been closed.
        Ok(self.endpoint.accept().await)
    }
}

#[async_trait]
impl PendingConnection for quinn::Incoming {
    type Conn = quinn::Connection;

    fn remote(&self) -> String {
        self.remote_address().to_string()
    }

    async fn establish(self) -> Result<quinn::Connection> {
        let remote = self.remote_address();
        self.await
            .map_err(|e| TelemetryError::accept_failed("handshake", format!("{remote}: {e}")))
    }
}

#[async_trait]
impl InboundConnection for quinn::Connection {
    type Recv = quinn::RecvStream;
    type Send = quinn::SendStream;

    async fn accept_stream(
        &self,
    ) -> Result<Option<InboundStream<quinn::RecvStream, quinn::SendStream>>> {
        match self.accept_bi().await {
            Ok((send, recv)) => {
                let id = VarInt::from(recv.id()).into_inner();
                Ok(Some(InboundStream { id, recv, send }))
            }
            // Every connection error is terminal for the connection.
            Err(e) => {
                match &e {
                    ConnectionError::ApplicationClosed(close) => {
                        debug!(remote = %self.remote_address(), code = %close.error_code, "Client closed connection");
                    }
                    ConnectionError::TimedOut => {
                        debug!(remote = %self.remote_address(), "Connection idle timeout");
                    }
                    other => {
                        debug!(remote = %self.remote_address(), error = %other, "Connection ended");
                    }
                }
                Ok(None)
            }
        }
    }

    fn remote(&self) -> String {
        self.remote_address().to_string()
    }

    fn close(&self, code: CloseCode) {
        quinn::Connection::close(self, code.var_int(), code.reason());
    }
}
