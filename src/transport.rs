//! QUIC endpoint construction.
//!
//! Translates [`TransportSettings`] into a quinn `TransportConfig` and builds
//! the client and server endpoints. Everything here runs at startup, so any
//! failure is a configuration error.
//!
//! quinn exposes one receive window per stream and per connection with no
//! separate initial value; the configured *max* windows are applied and the
//! *initial* windows are only validated by [`crate::config::Config::validate`].

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use quinn::{Endpoint, IdleTimeout, TransportConfig, VarInt};
use tracing::{debug, info};

use crate::config::TransportSettings;
use crate::tls::{ClientCredentials, ServerCredentials};
use crate::{Result, TelemetryError};

/// Application close codes sent with CONNECTION_CLOSE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Orderly shutdown
    Normal = 0,
    /// The session failed and is being discarded
    SessionError = 1,
}

impl CloseCode {
    pub fn var_int(self) -> VarInt {
        VarInt::from_u32(self as u32)
    }

    pub fn reason(self) -> &'static [u8] {
        match self {
            CloseCode::Normal => b"closing",
            CloseCode::SessionError => b"session error",
        }
    }
}

fn var_int(name: &str, value: u64) -> Result<VarInt> {
    VarInt::from_u64(value)
        .map_err(|_| TelemetryError::config(format!("{name} ({value}) exceeds the QUIC limit")))
}

/// Build the quinn transport parameters.
pub fn transport_config(settings: &TransportSettings) -> Result<TransportConfig> {
    let idle = IdleTimeout::try_from(settings.idle_timeout()).map_err(|_| {
        TelemetryError::config(format!(
            "idle timeout ({}s) exceeds the QUIC limit",
            settings.idle_timeout_secs
        ))
    })?;

    let mut transport = TransportConfig::default();
    transport
        .max_idle_timeout(Some(idle))
        .keep_alive_interval(settings.keep_alive_period())
        .max_concurrent_bidi_streams(var_int("max incoming streams", settings.max_incoming_streams)?)
        .max_concurrent_uni_streams(var_int(
            "max incoming uni streams",
            settings.max_incoming_uni_streams,
        )?)
        .stream_receive_window(var_int(
            "stream receive window",
            settings.max_stream_receive_window_bytes(),
        )?)
        .receive_window(var_int(
            "connection receive window",
            settings.max_connection_receive_window_bytes(),
        )?);

    debug!(?settings, "Built QUIC transport config");
    Ok(transport)
}

/// Bind the collector endpoint.
pub fn server_endpoint(
    listen: SocketAddr,
    settings: &TransportSettings,
    credentials: &ServerCredentials,
) -> Result<Endpoint> {
    let crypto = credentials.quic_config()?;
    let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
    server_config.transport_config(Arc::new(transport_config(settings)?));

    let endpoint = Endpoint::server(server_config, listen)?;
    info!(address = %endpoint.local_addr()?, "QUIC endpoint listening");
    Ok(endpoint)
}

/// Client-side quinn config: trust anchors plus transport parameters.
pub fn client_config(
    settings: &TransportSettings,
    credentials: &ClientCredentials,
) -> Result<quinn::ClientConfig> {
    let crypto = credentials.quic_config()?;
    let mut client_config = quinn::ClientConfig::new(Arc::new(crypto));
    client_config.transport_config(Arc::new(transport_config(settings)?));
    Ok(client_config)
}

/// Bind an ephemeral client endpoint for the given address family.
pub fn client_endpoint(ipv6: bool) -> Result<Endpoint> {
    let bind = if ipv6 {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    };
    Ok(Endpoint::client(bind)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_build() {
        transport_config(&TransportSettings::default()).unwrap();
    }

    #[test]
    fn oversized_stream_limit_is_rejected() {
        let settings =
            TransportSettings { max_incoming_streams: u64::MAX, ..TransportSettings::default() };
        let err = transport_config(&settings).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[test]
    fn close_codes_are_stable() {
        assert_eq!(CloseCode::Normal.var_int(), VarInt::from_u32(0));
        assert_eq!(CloseCode::SessionError.var_int(), VarInt::from_u32(1));
    }
}
