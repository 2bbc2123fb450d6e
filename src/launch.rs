//! Wiring of the client and collector pipelines.
//!
//! Everything that can fail because of configuration (credentials, transport
//! parameters, binding) fails here, before any task is spawned. The returned
//! handles own the tasks and shut them down in order: cancel, join the control
//! loop, then let the endpoint drain.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::buffer::RecordBuffer;
use crate::client::{BatchAssembler, QuicDialer, ReconnectSummary, Reconnector, SyntheticProducer};
use crate::config::Config;
use crate::server::{AcceptSummary, BatchProcessor, DecodePipeline, QuicListener, StreamAcceptor};
use crate::tls::{ClientCredentials, ServerCredentials};
use crate::transport::{self, CloseCode};

/// Default bound on waiting for the endpoint to drain at shutdown
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running client.
pub struct ClientHandle {
    buffer: Arc<RecordBuffer>,
    endpoint: quinn::Endpoint,
    reconnector: JoinHandle<ReconnectSummary>,
    producer: Option<JoinHandle<u64>>,
    cancel: CancellationToken,
}

impl ClientHandle {
    /// Validate the configuration, build the dialer and spawn the reconnector
    /// (and the synthetic producer when enabled).
    pub fn start(config: &Config, credentials: &ClientCredentials) -> Result<Self> {
        config.validate()?;

        let client = &config.client;
        let quic_config = transport::client_config(&config.transport, credentials)?;
        let dialer = QuicDialer::new(quic_config, &client.connect_address, &client.server_name)?;
        let endpoint = dialer.endpoint().clone();

        let buffer = Arc::new(RecordBuffer::new());
        let cancel = CancellationToken::new();

        let assembler = BatchAssembler::new(Arc::clone(&buffer), client.batch_interval());
        let reconnector =
            Reconnector::new(dialer, assembler, client.reconnect.policy()).spawn(cancel.clone());

        let producer = client.synthetic_producer.then(|| {
            let producer = SyntheticProducer::new(Arc::clone(&buffer), client.producer_interval());
            tokio::spawn(producer.run(cancel.clone()))
        });

        info!(
            address = %client.connect_address,
            batch_interval = ?client.batch_interval(),
            synthetic_producer = client.synthetic_producer,
            "Client started"
        );

        Ok(Self { buffer, endpoint, reconnector, producer, cancel })
    }

    /// Buffer that external producers insert records into.
    pub fn buffer(&self) -> &Arc<RecordBuffer> {
        &self.buffer
    }

    /// Token that stops every client task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop producing, close the live session and wait for the endpoint to
    /// drain, bounded by `grace`.
    pub async fn shutdown(self, grace: Duration) -> ReconnectSummary {
        self.cancel.cancel();

        if let Some(producer) = self.producer {
            if let Err(e) = producer.await {
                warn!(error = %e, "Producer task failed");
            }
        }

        let summary = match self.reconnector.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Reconnector task failed");
                ReconnectSummary::default()
            }
        };

        let pending = self.buffer.len();
        if pending > 0 {
            warn!(pending, "Discarding records that were never sent");
        }

        drain_endpoint(&self.endpoint, grace).await;
        summary
    }
}

/// A running collector.
pub struct ServerHandle {
    local_addr: SocketAddr,
    endpoint: quinn::Endpoint,
    acceptor: Arc<StreamAcceptor>,
    accept_loop: JoinHandle<AcceptSummary>,
    cancel: CancellationToken,
}

impl ServerHandle {
    /// Validate the configuration, bind the endpoint and spawn the accept loop.
    pub fn start(
        config: &Config,
        credentials: &ServerCredentials,
        processor: Arc<dyn BatchProcessor>,
    ) -> Result<Self> {
        config.validate()?;

        let listen = config.server.listen_socket_addr()?;
        let endpoint = transport::server_endpoint(listen, &config.transport, credentials)?;
        let local_addr = endpoint.local_addr()?;

        let pipeline = DecodePipeline::new(config.server.stream_buffer_size, processor);
        let acceptor = Arc::new(StreamAcceptor::new(pipeline));
        let cancel = CancellationToken::new();

        let accept_loop = {
            let acceptor = Arc::clone(&acceptor);
            let cancel = cancel.clone();
            let mut listener = QuicListener::new(endpoint.clone());
            tokio::spawn(async move { acceptor.run(&mut listener, &cancel).await })
        };

        info!(address = %local_addr, "Server started");
        Ok(Self { local_addr, endpoint, acceptor, accept_loop, cancel })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting, wait for every connection and stream task, then let
    /// the endpoint drain, bounded by `grace`.
    pub async fn shutdown(self, grace: Duration) -> AcceptSummary {
        self.cancel.cancel();

        let summary = match self.accept_loop.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Accept loop task failed");
                AcceptSummary::default()
            }
        };

        if tokio::time::timeout(grace, self.acceptor.wait()).await.is_err() {
            warn!(remaining = self.acceptor.active_tasks(), "Connection tasks still running at shutdown");
        }

        self.endpoint.close(CloseCode::Normal.var_int(), b"server closing");
        drain_endpoint(&self.endpoint, grace).await;

        info!(
            connections = summary.connections,
            accept_errors = summary.accept_errors,
            "Server shutdown complete"
        );
        summary
    }
}

async fn drain_endpoint(endpoint: &quinn::Endpoint, grace: Duration) {
    if tokio::time::timeout(grace, endpoint.wait_idle()).await.is_err() {
        warn!(grace = ?grace, "Endpoint did not go idle before the shutdown deadline");
    }
}

/// Resolve on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
