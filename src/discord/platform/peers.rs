// Posts exchange envelopes and debug notices to their Discord channels.

use crate::core::exchange::ExchangeMessage;
use crate::core::moderation::{ModerationError, PeerChannel};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Discord rejects message content longer than this.
const CONTENT_LIMIT: usize = 2000;
/// Name of the attachment carrying an envelope too long for the content.
pub const ENVELOPE_FILE: &str = "envelope.json";

fn platform_error(e: serenity::Error) -> ModerationError {
    ModerationError::PlatformError(e.to_string())
}

pub struct DiscordPeerChannel {
    http: Arc<serenity::Http>,
    /// Where envelopes go: the hide channel while hiding, else the exchange channel
    target: u64,
    debug_channel: u64,
}

impl DiscordPeerChannel {
    pub fn new(
        http: Arc<serenity::Http>,
        exchange_channel: u64,
        hide_channel: u64,
        should_hide: bool,
        debug_channel: u64,
    ) -> Self {
        let target = if should_hide {
            hide_channel
        } else {
            exchange_channel
        };
        Self {
            http,
            target,
            debug_channel,
        }
    }
}

#[async_trait]
impl PeerChannel for DiscordPeerChannel {
    async fn share(&self, message: ExchangeMessage) -> Result<(), ModerationError> {
        if self.target == 0 {
            tracing::debug!(action = %message.action, "No exchange channel, dropping envelope");
            return Ok(());
        }

        let text = serde_json::to_string(&message)?;
        let mut builder = serenity::CreateMessage::new();
        if text.len() <= CONTENT_LIMIT {
            builder = builder.content(text);
        } else {
            builder = builder.add_file(serenity::CreateAttachment::bytes(
                text.into_bytes(),
                ENVELOPE_FILE,
            ));
        }
        if let Some(attachment) = message.attachment {
            builder = builder.add_file(serenity::CreateAttachment::bytes(
                attachment.bytes,
                attachment.filename,
            ));
        }

        serenity::ChannelId::new(self.target)
            .send_message(&self.http, builder)
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_debug(&self, text: String) -> Result<(), ModerationError> {
        if self.debug_channel == 0 {
            tracing::info!("{}", text);
            return Ok(());
        }

        serenity::ChannelId::new(self.debug_channel)
            .say(&self.http, text)
            .await
            .map_err(platform_error)?;
        Ok(())
    }
}
