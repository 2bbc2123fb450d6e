//! Structured logging setup.
//!
//! All components log through `tracing`; binaries call [`init`] once at startup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global fmt subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `default_directive`
/// (for example `"suction=info"`). Calling this more than once is a no-op.
pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init("suction=debug");
        super::init("suction=info");
        tracing::info!("logging initialised twice without panicking");
    }
}
