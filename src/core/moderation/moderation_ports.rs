// Errors and ports (traits) the moderation core depends on.
//
// The core defines WHAT it needs; infra/ and discord/ provide the HOW.

use super::moderation_models::{AdminMember, DataFile};
use crate::core::exchange::ExchangeMessage;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Group {0} has no configuration")]
    MissingConfig(u64),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Platform error: {0}")]
    PlatformError(String),
}

/// Fail-open boundary for predicates and jobs.
///
/// A moderation defect must never block message flow, so an internal error
/// is logged here and replaced by the type's default (`false`, `None`).
pub fn fail_open<T: Default>(context: &str, result: Result<T, ModerationError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{} error: {}", context, e);
            T::default()
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Save/load of named tables.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replace the stored contents of `file`.
    async fn save(&self, file: DataFile, value: &Value) -> Result<(), ModerationError>;

    /// Stored contents of `file`, or `None` if it was never saved.
    async fn load(&self, file: DataFile) -> Result<Option<Value>, ModerationError>;
}

/// Group queries and membership actions on the chat platform.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// The group's admin roster. `None` when the roster cannot be read,
    /// which usually means the bot is no longer in the group.
    async fn admins(&self, group_id: u64) -> Option<Vec<AdminMember>>;

    /// Whether `user_id` is currently a member of the group.
    async fn is_member(&self, group_id: u64, user_id: u64) -> bool;

    /// Display name and link of the group.
    async fn group_info(&self, group_id: u64) -> (String, String);

    async fn leave(&self, group_id: u64) -> Result<(), ModerationError>;
}

/// Outbound traffic to peer bots and the debug channel.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    async fn share(&self, message: ExchangeMessage) -> Result<(), ModerationError>;

    async fn send_debug(&self, text: String) -> Result<(), ModerationError>;
}
