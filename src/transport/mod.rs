//! Controller Transports
//!
//! Provides the two ways of talking to an ONTAP controller:
//! - REST: structured resources addressed by uuid
//! - ZAPI: legacy XML RPC addressed by name
//!
//! plus an in-memory transport that impersonates either one.

pub mod element;
pub mod memory;
pub mod rest;
pub mod zapi;

pub use element::NaElement;
pub use memory::{Call, MemoryTransport};
pub use rest::RestTransport;
pub use zapi::ZapiTransport;

use crate::domain::ports::{BackendVariant, CapabilityProbe, EventSinkRef, TransportRef};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// =============================================================================
// Configuration
// =============================================================================

/// How to choose between REST and ZAPI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UseRest {
    /// REST without probing
    Always,
    /// ZAPI without probing
    Never,
    /// REST if the controller answers the probe
    #[default]
    Auto,
}

/// Connection settings for one controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Cluster management address
    pub hostname: String,
    pub username: String,
    pub password: String,
    /// Use HTTPS instead of HTTP
    pub https: bool,
    /// Verify the controller's certificate
    pub validate_certs: bool,
    /// Override the default port of the scheme
    pub http_port: Option<u16>,
    /// ZAPI minor version
    pub ontapi: Option<u32>,
    pub use_rest: UseRest,
    /// HTTP request timeout
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            username: "admin".to_string(),
            password: String::new(),
            https: false,
            validate_certs: true,
            http_port: None,
            ontapi: None,
            use_rest: UseRest::Auto,
            timeout_secs: 60,
        }
    }
}

impl ConnectionConfig {
    /// `scheme://host[:port]`
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        match self.http_port {
            Some(port) => format!("{}://{}:{}", scheme, self.hostname, port),
            None => format!("{}://{}", scheme, self.hostname),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::Configuration("hostname is required".into()));
        }
        if self.username.is_empty() {
            return Err(Error::Configuration("username is required".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Transport chosen for the run, plus the event sink when the backend has one
#[derive(Clone)]
pub struct Connection {
    pub transport: TransportRef,
    pub events: Option<EventSinkRef>,
}

impl Connection {
    pub fn variant(&self) -> BackendVariant {
        self.transport.variant()
    }
}

/// Decide which backend to use for the whole run
pub async fn select_variant(probe: &dyn CapabilityProbe, use_rest: UseRest) -> BackendVariant {
    match use_rest {
        UseRest::Always => BackendVariant::Modern,
        UseRest::Never => BackendVariant::Legacy,
        UseRest::Auto => {
            if probe.is_modern_backend_available().await {
                BackendVariant::Modern
            } else {
                BackendVariant::Legacy
            }
        }
    }
}

/// Factory for controller connections
pub struct TransportFactory;

impl TransportFactory {
    /// Probe the controller once and build the matching transport
    pub async fn connect(config: &ConnectionConfig) -> Result<Connection> {
        config.validate()?;

        let rest = RestTransport::new(config)?;
        let variant = select_variant(&rest, config.use_rest).await;
        info!("Using {} backend for {}", variant, config.hostname);

        Ok(match variant {
            BackendVariant::Modern => Connection {
                transport: Arc::new(rest),
                events: None,
            },
            BackendVariant::Legacy => {
                let zapi = Arc::new(ZapiTransport::new(config)?);
                Connection {
                    transport: zapi.clone(),
                    events: Some(zapi),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProbe(bool);

    #[async_trait]
    impl CapabilityProbe for FixedProbe {
        async fn is_modern_backend_available(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_select_variant() {
        let select = |available: bool, use_rest: UseRest| {
            tokio_test::block_on(select_variant(&FixedProbe(available), use_rest))
        };

        assert_eq!(select(true, UseRest::Auto), BackendVariant::Modern);
        assert_eq!(select(false, UseRest::Auto), BackendVariant::Legacy);
        assert_eq!(select(false, UseRest::Always), BackendVariant::Modern);
        assert_eq!(select(true, UseRest::Never), BackendVariant::Legacy);
    }

    #[test]
    fn test_base_url() {
        let mut config = ConnectionConfig {
            hostname: "cluster1".into(),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://cluster1");

        config.https = true;
        config.http_port = Some(8443);
        assert_eq!(config.base_url(), "https://cluster1:8443");
    }

    #[test]
    fn test_validate_requires_hostname() {
        let config = ConnectionConfig::default();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_never_uses_zapi_with_event_sink() {
        let config = ConnectionConfig {
            hostname: "cluster1".into(),
            use_rest: UseRest::Never,
            ..Default::default()
        };
        let connection = TransportFactory::connect(&config).await.unwrap();
        assert_eq!(connection.variant(), BackendVariant::Legacy);
        assert!(connection.events.is_some());
    }
}
