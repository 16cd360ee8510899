//! # whitelist-core
//!
//! Core types for the mc-whitelist binding service.
//!
//! This crate provides the foundational types shared by the console gateway
//! and the server:
//! - Game ID validation and the persisted `Binding` record
//! - The error taxonomy and its structured kinds
//! - Typed, validated configuration

pub mod binding;
pub mod config;
pub mod error;

pub use binding::{
    ADMIN_BIND_DISPLAY_NAME, Binding, BindingId, BindingSelector, GameId, MAX_GAME_ID_LEN,
    OwnerId, Requester,
};
pub use config::{ListMode, OriginFilter, RconConfig, WhitelistConfig};
pub use error::{ErrorKind, Result, WhitelistError};
