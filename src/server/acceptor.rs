//! Connection and stream acceptance.
//!
//! One loop accepts incoming connections and hands each to its own handler
//! task. The handler completes the handshake, then accepts streams, and each
//! stream gets its own decode task. A slow or stalled handshake therefore only
//! holds up its own handler. There is no admission limit on either level, so a
//! collector facing many clients should put a semaphore in front of
//! [`DecodePipeline::run`].

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::decode::DecodePipeline;
use crate::Result;
use crate::transport::CloseCode;

/// Source of inbound connections.
#[async_trait]
pub trait Listener: Send + 'static {
    type Pending: PendingConnection;

    /// Wait for the next incoming connection, before its handshake.
    ///
    /// Returns:
    /// - `Ok(Some(pending))` - A peer is connecting
    /// - `Ok(None)` - Listener closed, no more connections will arrive
    /// - `Err(e)` - This attempt failed; later ones may succeed
    async fn accept(&mut self) -> Result<Option<Self::Pending>>;
}

/// An incoming connection whose handshake has not completed yet.
#[async_trait]
pub trait PendingConnection: Send + 'static {
    type Conn: InboundConnection;

    /// Peer address, for logging
    fn remote(&self) -> String;

    /// Complete the handshake. A failure only affects this connection.
    async fn establish(self) -> Result<Self::Conn>;
}

/// One accepted stream with its identifier.
pub struct InboundStream<R, W> {
    pub id: u64,
    pub recv: R,
    pub send: W,
}

/// An accepted connection carrying inbound bidirectional streams.
#[async_trait]
pub trait InboundConnection: Send + Sync + 'static {
    type Recv: AsyncRead + Unpin + Send + 'static;
    type Send: AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next stream. Same contract as [`Listener::accept`].
    async fn accept_stream(&self) -> Result<Option<InboundStream<Self::Recv, Self::Send>>>;

    /// Peer address, for logging
    fn remote(&self) -> String;

    /// Close with an application error code.
    fn close(&self, code: CloseCode);
}

/// Counters reported when the accept loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptSummary {
    /// Incoming connections handed to a handler, handshake outcome aside
    pub connections: u64,
    pub accept_errors: u64,
}

/// Accept loop spawning one handler per connection and one decode task per
/// stream.
pub struct StreamAcceptor {
    pipeline: DecodePipeline,
    tracker: TaskTracker,
}

impl StreamAcceptor {
    pub fn new(pipeline: DecodePipeline) -> Self {
        Self { pipeline, tracker: TaskTracker::new() }
    }

    /// Accept until the listener closes or `cancel` fires.
    ///
    /// A failed accept is logged and the loop carries on. Spawned handlers keep
    /// running after this returns; use [`StreamAcceptor::wait`] to join them.
    pub async fn run<L: Listener>(
        &self,
        listener: &mut L,
        cancel: &CancellationToken,
    ) -> AcceptSummary {
        let mut summary = AcceptSummary::default();

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Acceptor received shutdown signal, stopping");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(Some(pending)) => {
                    summary.connections += 1;
                    debug!(remote = %pending.remote(), "Incoming connection");
                    self.tracker.spawn(handle_connection(
                        pending,
                        self.pipeline.clone(),
                        self.tracker.clone(),
                        cancel.clone(),
                    ));
                }
                Ok(None) => {
                    info!("Listener closed, acceptor stopping");
                    break;
                }
                Err(e) => {
                    summary.accept_errors += 1;
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }

        summary
    }

    /// Wait for every connection handler and stream task to finish.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Connection handlers and stream tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }
}

async fn handle_connection<P: PendingConnection>(
    pending: P,
    pipeline: DecodePipeline,
    tracker: TaskTracker,
    cancel: CancellationToken,
) {
    let remote = pending.remote();

    let established = tokio::select! {
        _ = cancel.cancelled() => return,
        established = pending.establish() => established,
    };
    let conn = match established {
        Ok(conn) => conn,
        Err(e) => {
            warn!(remote = %remote, error = %e, "Handshake failed");
            return;
        }
    };
    info!(remote = %remote, "New client connection");

    let mut streams = 0u64;
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = conn.accept_stream() => accepted,
        };

        match accepted {
            Ok(Some(stream)) => {
                streams += 1;
                debug!(remote = %remote, stream_id = stream.id, "New stream");
                let pipeline = pipeline.clone();
                let cancel = cancel.clone();
                tracker.spawn(async move {
                    pipeline.run(stream.id, stream.recv, stream.send, &cancel).await
                });
            }
            Ok(None) => break,
            Err(e) => warn!(remote = %remote, error = %e, "Failed to accept stream"),
        }
    }

    conn.close(CloseCode::Normal);
    info!(remote = %remote, streams, "Client connection closed");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    use super::*;
    use crate::codec::{FrameStats, encode_frame};
    use crate::model::Batch;
    use crate::TelemetryError;

    type Stream = InboundStream<DuplexStream, DuplexStream>;

    struct MockConn {
        streams: Mutex<VecDeque<Result<Option<Stream>>>>,
        closes: Arc<Mutex<Vec<CloseCode>>>,
    }

    #[async_trait]
    impl InboundConnection for MockConn {
        type Recv = DuplexStream;
        type Send = DuplexStream;

        async fn accept_stream(&self) -> Result<Option<Stream>> {
            let next = self.streams.lock().unwrap().pop_front();
            next.unwrap_or(Ok(None))
        }

        fn remote(&self) -> String {
            "192.0.2.1:50000".to_string()
        }

        fn close(&self, code: CloseCode) {
            self.closes.lock().unwrap().push(code);
        }
    }

    enum MockPending {
        Ready(MockConn),
        Fails,
        Stalls,
    }

    #[async_trait]
    impl PendingConnection for MockPending {
        type Conn = MockConn;

        fn remote(&self) -> String {
            "192.0.2.1:50000".to_string()
        }

        async fn establish(self) -> Result<MockConn> {
            match self {
                MockPending::Ready(conn) => Ok(conn),
                MockPending::Fails => {
                    Err(TelemetryError::accept_failed("handshake", "peer rejected certificate"))
                }
                MockPending::Stalls => std::future::pending().await,
            }
        }
    }

    struct MockListener {
        script: VecDeque<Result<Option<MockPending>>>,
    }

    #[async_trait]
    impl Listener for MockListener {
        type Pending = MockPending;

        async fn accept(&mut self) -> Result<Option<MockPending>> {
            match self.script.pop_front() {
                Some(step) => step,
                None => std::future::pending().await,
            }
        }
    }

    fn conn(streams: Vec<Result<Option<Stream>>>) -> (MockPending, Arc<Mutex<Vec<CloseCode>>>) {
        let closes = Arc::default();
        let conn = MockConn { streams: Mutex::new(streams.into()), closes: Arc::clone(&closes) };
        (MockPending::Ready(conn), closes)
    }

    /// A stream whose client side wrote one frame and finished. The returned
    /// half reads the acknowledgments.
    async fn stream_with_frame(id: u64, message: &str) -> (Stream, DuplexStream) {
        let batch = Batch { timestamp: 1, message: message.to_string(), readings: vec![0.5; 3] };
        let frame = encode_frame(&batch).unwrap();

        let (mut client_tx, server_rx) = duplex(64 * 1024);
        client_tx.write_all(&frame.bytes).await.unwrap();
        drop(client_tx);

        let (server_tx, client_rx) = duplex(64 * 1024);
        (InboundStream { id, recv: server_rx, send: server_tx }, client_rx)
    }

    fn acceptor() -> (StreamAcceptor, Arc<Mutex<Vec<String>>>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let processor = move |_id: u64, batch: &Batch, _stats: &FrameStats| {
            sink.lock().unwrap().push(batch.message.clone());
        };
        (StreamAcceptor::new(DecodePipeline::new(4096, Arc::new(processor))), seen)
    }

    #[tokio::test]
    async fn closed_listener_stops_without_spawning() {
        let (acceptor, _) = acceptor();
        let (late, _) = conn(Vec::new());
        let mut listener = MockListener { script: VecDeque::from([Ok(None), Ok(Some(late))]) };

        let summary = acceptor.run(&mut listener, &CancellationToken::new()).await;

        assert_eq!(summary, AcceptSummary { connections: 0, accept_errors: 0 });
        assert_eq!(listener.script.len(), 1);
        assert_eq!(acceptor.active_tasks(), 0);
    }

    #[tokio::test]
    async fn transient_accept_error_keeps_accepting() {
        let (acceptor, seen) = acceptor();
        let (stream, mut acks) = stream_with_frame(0, "after error").await;
        let (good, closes) = conn(vec![Ok(Some(stream))]);
        let mut listener = MockListener {
            script: VecDeque::from([
                Err(TelemetryError::accept_failed("connection", "socket error")),
                Ok(Some(good)),
                Ok(None),
            ]),
        };

        let summary = acceptor.run(&mut listener, &CancellationToken::new()).await;
        acceptor.wait().await;

        assert_eq!(summary, AcceptSummary { connections: 1, accept_errors: 1 });
        assert_eq!(*seen.lock().unwrap(), vec!["after error".to_string()]);
        assert_eq!(*closes.lock().unwrap(), vec![CloseCode::Normal]);

        let mut ack = String::new();
        acks.read_to_string(&mut ack).await.unwrap();
        assert!(ack.starts_with("Server received: after error (timestamp: 1, sensors: 3"));
    }

    #[tokio::test]
    async fn stalled_handshake_does_not_block_other_clients() {
        let (acceptor, seen) = acceptor();
        let (stream, mut acks) = stream_with_frame(0, "behind a stall").await;
        let (good, closes) = conn(vec![Ok(Some(stream))]);
        let mut listener = MockListener {
            script: VecDeque::from([Ok(Some(MockPending::Stalls)), Ok(Some(good)), Ok(None)]),
        };
        let cancel = CancellationToken::new();

        let summary = acceptor.run(&mut listener, &cancel).await;
        assert_eq!(summary, AcceptSummary { connections: 2, accept_errors: 0 });

        // The ack stream ends once the second client's stream task is done.
        let mut ack = String::new();
        tokio::time::timeout(Duration::from_secs(5), acks.read_to_string(&mut ack))
            .await
            .expect("second client served while the first handshake stalls")
            .unwrap();
        assert!(ack.starts_with("Server received: behind a stall"));
        assert_eq!(*seen.lock().unwrap(), vec!["behind a stall".to_string()]);

        // Only the stalled handshake is left; cancellation releases it.
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), acceptor.wait())
            .await
            .expect("stalled handshake honours cancellation");
        assert_eq!(*closes.lock().unwrap(), vec![CloseCode::Normal]);
    }

    #[tokio::test]
    async fn failed_handshake_only_ends_its_own_connection() {
        let (acceptor, seen) = acceptor();
        let (stream, _acks) = stream_with_frame(0, "after failure").await;
        let (good, closes) = conn(vec![Ok(Some(stream))]);
        let mut listener = MockListener {
            script: VecDeque::from([Ok(Some(MockPending::Fails)), Ok(Some(good)), Ok(None)]),
        };

        let summary = acceptor.run(&mut listener, &CancellationToken::new()).await;
        acceptor.wait().await;

        assert_eq!(summary, AcceptSummary { connections: 2, accept_errors: 0 });
        assert_eq!(*seen.lock().unwrap(), vec!["after failure".to_string()]);
        assert_eq!(*closes.lock().unwrap(), vec![CloseCode::Normal]);
    }

    #[tokio::test]
    async fn every_stream_gets_its_own_task() {
        let (acceptor, seen) = acceptor();
        let (first, _acks_first) = stream_with_frame(0, "first").await;
        let (second, _acks_second) = stream_with_frame(4, "second").await;
        let (multi, _) = conn(vec![
            Ok(Some(first)),
            Err(TelemetryError::accept_failed("stream", "flow control")),
            Ok(Some(second)),
        ]);
        let mut listener = MockListener { script: VecDeque::from([Ok(Some(multi)), Ok(None)]) };

        acceptor.run(&mut listener, &CancellationToken::new()).await;
        acceptor.wait().await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_stops_a_blocked_accept() {
        let (acceptor, _) = acceptor();
        let mut listener = MockListener { script: VecDeque::new() };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = acceptor.run(&mut listener, &cancel).await;
        acceptor.wait().await;

        assert_eq!(summary, AcceptSummary::default());
    }
}
