//! Collector side of the pipeline.
//!
//! ```text
//! QuicListener ──accept──▶ StreamAcceptor ──per connection──▶ handler (handshake)
//!                                                  │
//!                                          per stream ▼
//!                             DecodePipeline ──▶ BatchProcessor
//!                                   │
//!                                   └──ack──▶ same stream
//! ```

pub mod acceptor;
pub mod decode;
pub mod processor;
pub mod quic;

pub use acceptor::{
    AcceptSummary, InboundConnection, InboundStream, Listener, PendingConnection, StreamAcceptor,
};
pub use decode::{DecodePipeline, StreamEnd, StreamSummary, acknowledgment};
pub use processor::{BatchProcessor, LoggingProcessor};
pub use quic::QuicListener;
