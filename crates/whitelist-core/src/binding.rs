//! Binding types and game ID validation

use crate::error::{Result, WhitelistError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a game ID
pub const MAX_GAME_ID_LEN: usize = 16;

/// Display name recorded for bindings created by an administrator
pub const ADMIN_BIND_DISPLAY_NAME: &str = "<administrator manual bind>";

/// Registry-assigned binding identifier, never reused
pub type BindingId = u64;

/// Opaque chat identity of a binding owner
pub type OwnerId = String;

/// A validated game account identifier
///
/// 1 to 16 characters from `[A-Za-z0-9_]`. Comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Validate and wrap a game ID
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_GAME_ID_LEN {
            return Err(WhitelistError::InvalidFormat(format!(
                "game ID must be 1-{} characters, got {}",
                MAX_GAME_ID_LEN,
                raw.chars().count()
            )));
        }
        if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(WhitelistError::InvalidFormat(format!(
                "game ID {:?} may only contain letters, digits and underscores",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GameId {
    type Error = WhitelistError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

/// A persisted association between one game ID and one chat identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub id: BindingId,
    pub game_id: GameId,
    pub owner_id: OwnerId,
    pub owner_display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Binding {
    /// Creation time formatted for humans
    pub fn created_at_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// The chat identity issuing a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requester {
    pub id: OwnerId,
    #[serde(default)]
    pub name: String,
    /// Chat-group context the request came from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Requester {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// How an administrator names the binding to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSelector {
    /// `#<digits>`
    Id(BindingId),
    GameId(GameId),
}

impl BindingSelector {
    /// Parse `#<digits>` as a numeric id, anything else as a game ID
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.strip_prefix('#') {
            Some(digits) => {
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(WhitelistError::InvalidFormat(format!(
                        "binding id must be # followed by digits, got {:?}",
                        raw
                    )));
                }
                digits
                    .parse::<BindingId>()
                    .map(BindingSelector::Id)
                    .map_err(|e| WhitelistError::InvalidFormat(format!("binding id {}: {}", raw, e)))
            }
            None => GameId::parse(raw).map(BindingSelector::GameId),
        }
    }
}

impl fmt::Display for BindingSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSelector::Id(id) => write!(f, "#{}", id),
            BindingSelector::GameId(game_id) => write!(f, "{}", game_id),
        }
    }
}
