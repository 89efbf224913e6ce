// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "exchange/mod.rs"]
pub mod exchange;

#[path = "maintenance/mod.rs"]
pub mod maintenance;
