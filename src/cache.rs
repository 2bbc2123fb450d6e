//! Downstream cache liveness check.
//!
//! The collector does not write to the cache on the telemetry path; it only
//! verifies at startup that the configured store answers, so a misconfigured
//! deployment fails before accepting connections.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::{Result, TelemetryError};

/// Deadline for one liveness check
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Something that can report whether the downstream cache is reachable.
#[async_trait]
pub trait CacheProbe: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// Redis (or Valkey) liveness probe.
pub struct RedisProbe {
    client: redis::Client,
    timeout: Duration,
}

impl RedisProbe {
    /// Parse the URL. No connection is made until [`CacheProbe::ping`].
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| TelemetryError::cache(format!("invalid cache URL: {e}"), Some(Box::new(e))))?;
        Ok(Self { client, timeout: PING_TIMEOUT })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CacheProbe for RedisProbe {
    async fn ping(&self) -> Result<()> {
        let check = async {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| TelemetryError::cache("connection failed", Some(Box::new(e))))?;

            let reply = redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|e| TelemetryError::cache("PING failed", Some(Box::new(e))))?;

            info!(reply = %reply, "Cache connection successful");
            Ok::<_, TelemetryError>(())
        };

        tokio::time::timeout(self.timeout, check)
            .await
            .map_err(|_| TelemetryError::cache(format!("PING timed out after {:?}", self.timeout), None))?
    }
}
