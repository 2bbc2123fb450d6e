//! Resilient sensor telemetry over QUIC.
//!
//! Suction moves batches of sensor readings from edge clients to a collector
//! over an encrypted, multiplexed QUIC connection, riding out unreliable
//! connectivity on the client side and corrupt input on the collector side.
//!
//! # Features
//!
//! - **Buffered batching**: producers insert records concurrently; one batch per tick
//! - **Compact wire format**: Protocol Buffers compressed with Snappy
//! - **Unbounded reconnection**: exponential backoff, reset after every successful connect
//! - **Tolerant collector**: undecodable frames are skipped, the stream stays open
//! - **Cooperative shutdown**: one cancellation token stops every task
//!
//! # Quick Start
//!
//! The `suction-client` and `suction-server` binaries wire everything from a
//! YAML file plus `SUCTION_*` environment variables. Embedding applications use
//! [`ClientHandle`] and [`ServerHandle`] directly.
//!
//! ## Example (client)
//!
//! ```rust,no_run
//! use std::path::Path;
//! use suction::{ClientCredentials, ClientHandle, Config, SensorRecord};
//!
//! #[tokio::main]
//! async fn main() -> suction::Result<()> {
//!     let mut config = Config::load(None)?;
//!     config.client.synthetic_producer = false;
//!
//!     let credentials = ClientCredentials::from_pem_file(Path::new("samples/server.crt"))?;
//!     let client = ClientHandle::start(&config, &credentials)?;
//!
//!     client.buffer().insert(SensorRecord::now("boiler-3", vec![71.5, 71.9, 72.4]));
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.shutdown(suction::DEFAULT_SHUTDOWN_GRACE).await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod model;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Pipeline building blocks
pub mod backoff;
pub mod buffer;
pub mod codec;

// Client and collector
pub mod client;
pub mod server;

// Collaborators
pub mod cache;
pub mod config;
pub mod logging;
pub mod tls;
pub mod transport;

mod launch;

// Core exports
pub use error::*;
pub use model::{Batch, SensorRecord};

// Pipeline exports
pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use buffer::RecordBuffer;
pub use codec::{EncodedFrame, FrameStats, decode_frame, encode_frame};

// Main API exports
pub use config::Config;
pub use launch::{ClientHandle, DEFAULT_SHUTDOWN_GRACE, ServerHandle, shutdown_signal};
pub use server::{BatchProcessor, LoggingProcessor};
pub use tls::{ClientCredentials, ServerCredentials};
