// Discord layer - commands, event handlers and the platform adapters.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "platform/mod.rs"]
pub mod platform;

use crate::core::exchange::ExchangeService;
use crate::core::moderation::{ModerationService, ModerationState};
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared across all commands and event handlers.
pub struct Data {
    pub state: Arc<ModerationState>,
    pub moderation: Arc<ModerationService>,
    pub exchange: Arc<ExchangeService>,
}
