// Per-guild long-message settings.
//
// Thin layer: read the guild id, call the state, format the reply.

use crate::core::moderation::GroupConfig;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Smallest limit an admin may set, in bytes.
const MIN_LIMIT: usize = 100;
/// Largest limit an admin may set, in bytes.
const MAX_LIMIT: usize = 10_000;

fn config_embed(title: &str, config: &GroupConfig) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .color(if config.delete { 0x00FF00 } else { 0xFFA500 })
        .field("Limit", format!("{} bytes", config.limit), true)
        .field(
            "Delete long messages",
            if config.delete { "Yes" } else { "No" },
            true,
        )
        .field(
            "Settings",
            if config.default { "Default" } else { "Custom" },
            true,
        )
}

/// Long-message guard settings for this server.
#[poise::command(
    slash_command,
    subcommands("status", "limit", "delete", "reset"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn long(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - subcommands do the work
    Ok(())
}

/// Show the current settings.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let state = &ctx.data().state;

    let config = state
        .configs
        .get(&guild_id.get())
        .map(|c| c.clone())
        .unwrap_or_else(|| GroupConfig::with_limit(state.settings.default_limit));

    ctx.send(poise::CreateReply::default().embed(config_embed("📏 Long Message Guard", &config)))
        .await?;
    Ok(())
}

/// Set the length (in bytes) at which a message counts as long.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn limit(
    ctx: Context<'_>,
    #[description = "Limit in bytes"]
    #[min = 100]
    #[max = 10000]
    bytes: u32,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let bytes = bytes as usize;
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&bytes) {
        ctx.say(format!(
            "❌ The limit must be between {} and {} bytes.",
            MIN_LIMIT, MAX_LIMIT
        ))
        .await?;
        return Ok(());
    }

    let config = ctx
        .data()
        .state
        .update_config(guild_id.get(), |c| c.limit = bytes)
        .await?;
    tracing::info!(group_id = guild_id.get(), limit = bytes, "Limit changed");

    ctx.send(poise::CreateReply::default().embed(config_embed("✅ Limit updated", &config)))
        .await?;
    Ok(())
}

/// Choose whether long messages are deleted.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Delete long messages"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let config = ctx
        .data()
        .state
        .update_config(guild_id.get(), |c| c.delete = enabled)
        .await?;
    tracing::info!(group_id = guild_id.get(), delete = enabled, "Delete toggled");

    ctx.send(poise::CreateReply::default().embed(config_embed("✅ Settings updated", &config)))
        .await?;
    Ok(())
}

/// Go back to the default settings.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let config = ctx.data().state.reset_config(guild_id.get()).await?;

    ctx.send(poise::CreateReply::default().embed(config_embed("♻️ Settings reset", &config)))
        .await?;
    Ok(())
}
