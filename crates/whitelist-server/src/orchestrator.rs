//! Binding orchestration
//!
//! Sequences policy checks, registry validation, console commands and the
//! registry commit for every inbound operation. Ordering differs by
//! operation:
//!
//! - bind: validate locally, add on the server, then insert. A failed add
//!   leaves the registry untouched. Binds of the same game ID run one at a
//!   time, so a compensating removal never undoes another caller's add.
//! - unbind: remove on the server first, delete locally only if the server
//!   did not report a failure. A stale remote entry is worse than a no-op the
//!   user can retry.
//! - admin delete: registry-authoritative. The row is deleted whatever the
//!   server says, and a remote failure is returned as a warning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{info, warn};
use whitelist_core::{
    ADMIN_BIND_DISPLAY_NAME, Binding, BindingSelector, GameId, ListMode, Requester, Result,
    WhitelistConfig, WhitelistError,
};
use whitelist_rcon::{
    CommandGateway, CommandTranslator, LIST_COMMAND, OnlineList, OnlineStatus, RemovalOutcome,
    parse_online_list, say_command, strip_formatting_codes,
};

use crate::policy::AccessPolicy;
use crate::registry::BindingRegistry;

/// Line broadcast in-game by the connection self-test
const PING_BROADCAST: &str = "testing mc-whitelist binding service";

/// Successful bind
#[derive(Debug, Clone)]
pub struct BindOutcome {
    pub binding: Binding,
    /// Console response to the add command, formatting stripped
    pub remote_response: String,
}

/// Successful admin delete
#[derive(Debug, Clone)]
pub struct AdminDeleteOutcome {
    pub binding: Binding,
    /// Set when the remote removal failed; the row was deleted anyway
    pub remote_warning: Option<String>,
}

/// Use-case layer over the registry and the console gateway
pub struct BindingService {
    registry: BindingRegistry,
    gateway: Arc<dyn CommandGateway>,
    translator: CommandTranslator,
    policy: AccessPolicy,
    /// In-flight binds keyed by game ID
    bind_locks: StdMutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl BindingService {
    pub fn new(
        registry: BindingRegistry,
        gateway: Arc<dyn CommandGateway>,
        translator: CommandTranslator,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            registry,
            gateway,
            translator,
            policy,
            bind_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Build translator and policy from config around an existing registry
    /// and gateway
    pub fn from_config(
        config: &WhitelistConfig,
        registry: BindingRegistry,
        gateway: Arc<dyn CommandGateway>,
    ) -> Self {
        let mut translator = CommandTranslator::new(config.list_mode);
        if let Some(markers) = &config.removal_failure_markers {
            translator = translator.with_removal_failure_markers(markers.clone());
        }
        Self::new(registry, gateway, translator, AccessPolicy::from_config(config))
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn list_mode(&self) -> ListMode {
        self.translator.mode()
    }

    /// Bind a game ID to the requester
    pub async fn bind(&self, requester: &Requester, raw_game_id: &str) -> Result<BindOutcome> {
        info!(
            "Bind {} requested by {} ({})",
            raw_game_id, requester.id, requester.name
        );
        self.policy.require_origin(requester)?;
        let game_id = GameId::parse(raw_game_id)?;
        self.bind_for(&game_id, &requester.id, &requester.name).await
    }

    /// Bind a game ID to another owner on an administrator's behalf
    pub async fn admin_bind(
        &self,
        requester: &Requester,
        raw_game_id: &str,
        owner_id: &str,
    ) -> Result<BindOutcome> {
        self.policy.require_admin(requester)?;
        info!(
            "Admin {} binding {} to {}",
            requester.id, raw_game_id, owner_id
        );
        let game_id = GameId::parse(raw_game_id)?;
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(WhitelistError::InvalidFormat(
                "target owner ID must not be empty".to_string(),
            ));
        }
        self.bind_for(&game_id, owner_id, ADMIN_BIND_DISPLAY_NAME).await
    }

    async fn bind_for(
        &self,
        game_id: &GameId,
        owner_id: &str,
        display_name: &str,
    ) -> Result<BindOutcome> {
        let lock = self.acquire_bind_lock(game_id)?;
        let result = {
            let _held = lock.lock().await;
            self.bind_locked(game_id, owner_id, display_name).await
        };
        self.release_bind_lock(game_id, lock);
        result
    }

    fn acquire_bind_lock(&self, game_id: &GameId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .bind_locks
            .lock()
            .map_err(|_| WhitelistError::Storage("bind lock table poisoned".to_string()))?;
        Ok(locks.entry(game_id.clone()).or_default().clone())
    }

    fn release_bind_lock(&self, game_id: &GameId, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.bind_locks.lock() else {
            return;
        };
        // One reference in the table plus ours means nobody else is waiting
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(game_id);
        }
    }

    /// Runs with the game ID's bind lock held
    async fn bind_locked(
        &self,
        game_id: &GameId,
        owner_id: &str,
        display_name: &str,
    ) -> Result<BindOutcome> {
        if let Some(existing) = self.registry.find_by_game_id(game_id).await? {
            return Err(if existing.owner_id == owner_id {
                WhitelistError::AlreadyBound(game_id.to_string())
            } else {
                WhitelistError::BoundToOther(game_id.to_string())
            });
        }

        let max = self.registry.max_bindings_per_owner();
        if self.registry.find_by_owner(owner_id).await?.len() >= max {
            return Err(WhitelistError::QuotaExceeded {
                owner: owner_id.to_string(),
                max,
            });
        }

        let response = self
            .gateway
            .execute(&self.translator.to_add_command(game_id))
            .await
            .map_err(WhitelistError::into_remote_unavailable)?;

        match self.registry.insert(game_id, owner_id, display_name).await {
            Ok(binding) => {
                info!("Bound {} to {} (#{})", game_id, owner_id, binding.id);
                Ok(BindOutcome {
                    binding,
                    remote_response: strip_formatting_codes(&response).trim().to_string(),
                })
            }
            // Written by another registry user, who owns the remote entry
            Err(e @ WhitelistError::DuplicateGameId(_)) => Err(e),
            Err(e) => {
                warn!(
                    "Insert of {} failed after remote add ({}); removing remote entry",
                    game_id, e
                );
                self.compensate_add(game_id).await;
                Err(e)
            }
        }
    }

    async fn compensate_add(&self, game_id: &GameId) {
        match self
            .gateway
            .execute(&self.translator.to_remove_command(game_id))
            .await
        {
            Ok(response) => {
                if let RemovalOutcome::Failed(text) = self.translator.parse_removal_response(&response)
                {
                    warn!("Compensating removal of {} reported: {}", game_id, text);
                }
            }
            Err(e) => warn!("Compensating removal of {} failed: {}", game_id, e),
        }
    }

    /// Remove one of the requester's own bindings
    pub async fn unbind(&self, requester: &Requester, raw_game_id: &str) -> Result<Binding> {
        info!("Unbind {} requested by {}", raw_game_id, requester.id);
        self.policy.require_origin(requester)?;
        let game_id = GameId::parse(raw_game_id)?;

        let binding = self
            .registry
            .find_by_owner(&requester.id)
            .await?
            .into_iter()
            .find(|b| b.game_id == game_id)
            .ok_or_else(|| WhitelistError::NotYoursOrNotFound(game_id.to_string()))?;

        let response = self
            .gateway
            .execute(&self.translator.to_remove_command(&game_id))
            .await
            .map_err(WhitelistError::into_remote_unavailable)?;

        if let RemovalOutcome::Failed(text) = self.translator.parse_removal_response(&response) {
            warn!("Remote removal of {} refused, keeping binding: {}", game_id, text);
            return Err(WhitelistError::RemoteRejected(text));
        }

        self.registry.delete_by_id(binding.id).await?;
        info!("Unbound {} from {}", game_id, requester.id);
        Ok(binding)
    }

    /// Delete a binding by `#id` or game ID regardless of the remote outcome
    pub async fn admin_delete(
        &self,
        requester: &Requester,
        identifier: &str,
    ) -> Result<AdminDeleteOutcome> {
        self.policy.require_admin(requester)?;
        let selector = BindingSelector::parse(identifier)?;
        info!("Admin {} deleting {}", requester.id, selector);

        let found = match &selector {
            BindingSelector::Id(id) => self.registry.find_by_id(*id).await?,
            BindingSelector::GameId(game_id) => self.registry.find_by_game_id(game_id).await?,
        };
        let binding = found.ok_or_else(|| WhitelistError::NotFound(selector.to_string()))?;

        let remote_warning = match self
            .gateway
            .execute(&self.translator.to_remove_command(&binding.game_id))
            .await
        {
            Ok(response) => match self.translator.parse_removal_response(&response) {
                RemovalOutcome::Removed => None,
                RemovalOutcome::Failed(text) => Some(text),
            },
            Err(e) => Some(e.into_remote_unavailable().to_string()),
        };
        if let Some(warning) = &remote_warning {
            warn!(
                "Remote removal of {} failed, deleting registry row anyway: {}",
                binding.game_id, warning
            );
        }

        self.registry.delete_by_id(binding.id).await?;
        info!("Deleted binding #{} ({})", binding.id, binding.game_id);
        Ok(AdminDeleteOutcome {
            binding,
            remote_warning,
        })
    }

    /// The requester's own bindings
    pub async fn query_own(&self, requester: &Requester) -> Result<Vec<Binding>> {
        self.policy.require_origin(requester)?;
        self.registry.find_by_owner(&requester.id).await
    }

    /// Another owner's bindings (administrators only)
    pub async fn query_other(&self, requester: &Requester, owner_id: &str) -> Result<Vec<Binding>> {
        self.policy.require_admin(requester)?;
        self.registry.find_by_owner(owner_id.trim()).await
    }

    /// Unrestricted console pass-through (administrators only)
    ///
    /// The text is sent verbatim. Anything the console accepts, including
    /// `stop` or `op`, will run.
    pub async fn raw_command(&self, requester: &Requester, command: &str) -> Result<String> {
        self.policy.require_admin(requester)?;
        if command.trim().is_empty() {
            return Err(WhitelistError::InvalidFormat(
                "command text must not be empty".to_string(),
            ));
        }
        info!("Admin {} running console command: {}", requester.id, command);
        let response = self
            .gateway
            .execute(command)
            .await
            .map_err(WhitelistError::into_remote_unavailable)?;
        Ok(strip_formatting_codes(&response))
    }

    /// Players currently online
    pub async fn online(&self, requester: &Requester) -> Result<OnlineStatus> {
        self.policy.require_origin(requester)?;
        let response = self
            .gateway
            .execute(LIST_COMMAND)
            .await
            .map_err(WhitelistError::into_remote_unavailable)?;
        match parse_online_list(&response) {
            OnlineList::Parsed(status) => Ok(status),
            OnlineList::Unparseable(text) => Err(WhitelistError::ParseUnstable(text)),
        }
    }

    /// Broadcast a test line to verify console connectivity
    pub async fn ping(&self, requester: &Requester) -> Result<String> {
        self.policy.require_origin(requester)?;
        let response = self
            .gateway
            .execute(&say_command(PING_BROADCAST))
            .await
            .map_err(WhitelistError::into_remote_unavailable)?;
        Ok(strip_formatting_codes(&response))
    }
}
