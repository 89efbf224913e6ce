// Long-message handling - translates core moderation decisions to Discord actions.

use super::inbound::{inbound_message, join_event};
use crate::core::moderation::{fail_open, ModerationAction};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

const BAN_REASON: &str = "Long message";

/// Check a guild message and act on it.
///
/// Returns the action taken.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<ModerationAction, Error> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(ModerationAction::None);
    };

    let bot_id = ctx.cache.current_user().id.get();
    if msg.author.id.get() == bot_id {
        return Ok(ModerationAction::None);
    }

    let message = inbound_message(msg, bot_id);
    let moderation = &data.moderation;

    // Nothing is acted on in the test group, it only gets a report.
    if fail_open("Is test group", moderation.filters().is_test_group(&message)) {
        if message.text().is_some() {
            let report = moderation.test_report(&message).await;
            msg.reply(&ctx.http, report).await?;
        }
        return Ok(ModerationAction::None);
    }

    let action = moderation.evaluate(&message).await;
    if action == ModerationAction::None {
        return Ok(action);
    }

    if let Err(e) = msg.delete(&ctx.http).await {
        tracing::warn!(
            group_id = guild_id.get(),
            message_id = msg.id.get(),
            "Failed to delete long message: {}",
            e
        );
        return Ok(ModerationAction::None);
    }

    if action == ModerationAction::Ban {
        if let Err(e) = guild_id
            .ban_with_reason(&ctx.http, msg.author.id, 0, BAN_REASON)
            .await
        {
            tracing::warn!(
                group_id = guild_id.get(),
                user_id = msg.author.id.get(),
                "Failed to ban user: {}",
                e
            );
        }
    }

    moderation
        .record_action(guild_id.get(), msg.author.id.get(), action)
        .await?;
    Ok(action)
}

/// Set up a guild the bot was just invited to.
pub async fn handle_guild_join(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    data: &Data,
) -> Result<(), Error> {
    let bot_id = ctx.cache.current_user().id.get();
    data.moderation
        .join_group(&join_event(guild_id.get(), bot_id))
        .await?;
    Ok(())
}
