// Core moderation module - trust tiers, long text detection and lexicons.

pub mod filters;
pub mod lexicon;
pub mod moderation_models;
pub mod moderation_ports;
pub mod moderation_service;
pub mod notices;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use filters::Filters;
pub use lexicon::Lexicon;
pub use moderation_models::*;
pub use moderation_ports::*;
pub use moderation_service::ModerationService;
pub use state::ModerationState;
