//! # whitelist-server
//!
//! Self-service game whitelist binding over a remote console.
//!
//! This crate provides:
//! - `BindingRegistry`: SQLite-backed game ID ↔ chat identity mapping
//! - `AccessPolicy`: administrator and origin checks
//! - `BindingService`: orchestration of registry and console operations
//! - Command handlers and a JSON-lines stdio transport

pub mod commands;
pub mod orchestrator;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use orchestrator::{AdminDeleteOutcome, BindOutcome, BindingService};
pub use policy::AccessPolicy;
pub use registry::BindingRegistry;

use std::sync::Arc;
use tracing::info;
use whitelist_core::{Result, WhitelistConfig};
use whitelist_rcon::{RconSession, SessionGateway};

/// Whitelist command server
pub struct WhitelistServer {
    service: Arc<BindingService>,
}

impl WhitelistServer {
    pub fn new(service: BindingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Open the registry and set up the console gateway from validated config
    pub fn from_config(config: &WhitelistConfig) -> Result<Self> {
        config.validate()?;

        let registry =
            BindingRegistry::open(&config.database_path, config.max_bindings_per_owner)?;
        let gateway = Arc::new(SessionGateway::new(RconSession::from_config(&config.rcon)));
        info!(
            "Console gateway targets {} ({:?} mode)",
            config.rcon.address(),
            config.list_mode
        );

        Ok(Self::new(BindingService::from_config(config, registry, gateway)))
    }

    pub fn service(&self) -> Arc<BindingService> {
        self.service.clone()
    }

    /// Run the server on stdio transport
    pub async fn run_stdio(self) -> Result<()> {
        transport::stdio::run(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitelist_core::ErrorKind;

    #[test]
    fn test_from_config_refuses_empty_password() {
        let config = WhitelistConfig::default();
        let err = WhitelistServer::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_from_config_opens_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WhitelistConfig::default();
        config.rcon.password = "secret".to_string();
        config.database_path = dir.path().join("data/whitelist.db");

        let server = WhitelistServer::from_config(&config).unwrap();
        assert_eq!(server.service().registry().max_bindings_per_owner(), 3);
        assert!(config.database_path.exists());
    }
}
