//! Session and gateway abstractions
//!
//! A [`ConsoleSession`] is one non-reentrant console connection. The
//! [`SessionGateway`] owns exactly one session and turns each command into a
//! connect → send → disconnect exchange under a mutex, so concurrent callers
//! never see each other's responses.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error};
use whitelist_core::Result;

/// Trait for a single remote console connection
#[async_trait]
pub trait ConsoleSession: Send {
    /// Open the connection and authenticate
    async fn connect(&mut self) -> Result<()>;

    /// Send one command and wait for its full response
    async fn send(&mut self, command: &str) -> Result<String>;

    /// Release the connection; idempotent
    async fn disconnect(&mut self);
}

/// Trait for executing console commands one at a time
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Execute a single command and return the raw response text
    async fn execute(&self, command: &str) -> Result<String>;
}

/// Gateway serializing all commands through one owned session
pub struct SessionGateway<S: ConsoleSession> {
    session: Mutex<S>,
}

impl<S: ConsoleSession> SessionGateway<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// Consume the gateway and return the session
    pub fn into_inner(self) -> S {
        self.session.into_inner()
    }
}

#[async_trait]
impl<S: ConsoleSession> CommandGateway for SessionGateway<S> {
    async fn execute(&self, command: &str) -> Result<String> {
        // Held across the whole exchange
        let mut session = self.session.lock().await;

        if let Err(e) = session.connect().await {
            error!("Console connect failed: {}", e);
            session.disconnect().await;
            return Err(e);
        }

        let result = session.send(command).await;
        session.disconnect().await;

        match &result {
            Ok(response) => debug!("Console exchange complete ({} bytes)", response.len()),
            Err(e) => error!("Console command failed: {}", e),
        }
        result
    }
}
