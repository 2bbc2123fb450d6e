//! Client side of the pipeline.
//!
//! ```text
//! producers ──insert──▶ RecordBuffer ──tick──▶ BatchAssembler ──send──▶ TransportSession
//!                                                                   ▲
//!                                         Reconnector (owns session, backoff, cancel)
//! ```
//!
//! The session seams ([`Dialer`], [`Link`], [`FrameSink`]) are traits so the
//! control loop can run against quinn in production and scripted doubles in
//! tests.

pub mod assembler;
pub mod producer;
pub mod quic;
pub mod reconnect;
pub mod session;


pub use assembler::{AssembledFrame, BatchAssembler};
pub use producer::SyntheticProducer;
pub use quic::{QuicDialer, QuicFrameSink};
pub use reconnect::{ReconnectSummary, Reconnector};
pub use session::{Dialer, FrameSink, Link, SessionState, TransportSession};
