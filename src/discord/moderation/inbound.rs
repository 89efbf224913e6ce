// Serenity message -> core `InboundMessage`.

use crate::core::moderation::{InboundMessage, Sender};
use poise::serenity_prelude as serenity;

/// Source channel of a cross-posted announcement.
pub fn forward_origin(
    flags: Option<serenity::MessageFlags>,
    reference_channel: Option<u64>,
) -> Option<u64> {
    let crosspost = flags.is_some_and(|f| f.contains(serenity::MessageFlags::IS_CROSSPOST));
    if crosspost {
        reference_channel
    } else {
        None
    }
}

/// Content plus embed titles and descriptions, one per line.
pub fn collect_text<'a>(content: &'a str, extra: impl IntoIterator<Item = &'a str>) -> String {
    std::iter::once(content)
        .chain(extra)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A guild message as the moderation core sees it. The guild is the group.
pub fn inbound_message(msg: &serenity::Message, bot_id: u64) -> InboundMessage {
    let author = msg.author.id.get();
    let embeds = msg
        .embeds
        .iter()
        .flat_map(|e| [e.title.as_deref(), e.description.as_deref()])
        .flatten();

    InboundMessage {
        message_id: msg.id.get(),
        chat_id: msg.guild_id.map(|g| g.get()).unwrap_or(msg.channel_id.get()),
        sender: Some(Sender {
            id: author,
            is_self: author == bot_id,
        }),
        forward_from_user: None,
        forward_from_channel: forward_origin(
            msg.flags,
            msg.message_reference.as_ref().map(|r| r.channel_id.get()),
        ),
        text: Some(collect_text(&msg.content, embeds)),
        new_members: Vec::new(),
        group_created: false,
    }
}

/// The same message keyed by channel, for the exchange-channel checks.
pub fn channel_view(msg: &serenity::Message) -> InboundMessage {
    InboundMessage {
        message_id: msg.id.get(),
        chat_id: msg.channel_id.get(),
        ..Default::default()
    }
}

/// The bot itself joining `guild_id`.
pub fn join_event(guild_id: u64, bot_id: u64) -> InboundMessage {
    InboundMessage {
        chat_id: guild_id,
        new_members: vec![bot_id],
        ..Default::default()
    }
}
