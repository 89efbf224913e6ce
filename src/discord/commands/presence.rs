// This module handles bot presence and lifecycle events.
//
// Everything here is Discord-layer glue: we only work with Discord SDK types
// (Context, ActivityData, OnlineStatus) and keep the logic short.

use poise::serenity_prelude as serenity;

/// Called once the bot is ready. Shows which project this bot is.
pub fn on_ready(ctx: &serenity::Context, project_name: &str) {
    let activity = serenity::ActivityData::watching(format!("{} | long messages", project_name));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
