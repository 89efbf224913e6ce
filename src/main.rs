// This is the entry point of the long-message guard bot.
//
// **Architecture Overview:**
// - `core/` = Moderation policy (platform-agnostic)
// - `infra/` = Implementations of core traits (table storage)
// - `discord/` = Discord-specific adapters (commands, events, platform ports)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Spawn the maintenance schedule

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::config::BotConfig;
use crate::core::exchange::ExchangeService;
use crate::core::maintenance::{schedule, MaintenanceService};
use crate::core::moderation::{fail_open, Filters, ModerationService, ModerationState};
use crate::discord::commands::presence;
use crate::discord::moderation::inbound::channel_view;
use crate::discord::moderation::long_handler;
use crate::discord::platform::peers::ENVELOPE_FILE;
use crate::discord::platform::{DiscordPeerChannel, SerenityDirectory};
use crate::discord::{Data, Error};
use crate::infra::tables::JsonTableStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often the recorded users are forgotten.
const RECORD_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Raw text of an exchange-channel post. Long envelopes arrive as a file.
async fn exchange_text(msg: &serenity::Message) -> Result<Option<String>, Error> {
    if !msg.content.is_empty() {
        return Ok(Some(msg.content.clone()));
    }

    match msg.attachments.iter().find(|a| a.filename == ENVELOPE_FILE) {
        Some(attachment) => {
            let bytes = attachment.download().await?;
            Ok(Some(String::from_utf8(bytes)?))
        }
        None => Ok(None),
    }
}

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            let filters = data.moderation.filters();
            let view = channel_view(new_message);

            // Peer bots talk on the exchange channel; nothing there is moderated.
            if fail_open("Is exchange channel", filters.is_exchange_channel(&view))
                || fail_open("Is hide channel", filters.is_hide_channel(&view))
            {
                if let Some(text) = exchange_text(new_message).await? {
                    match data.exchange.receive_text(&text).await {
                        Ok(outcome) => tracing::debug!(?outcome, "Exchange post handled"),
                        Err(e) => tracing::warn!("Exchange receive error: {}", e),
                    }
                }
                return Ok(());
            }

            match long_handler::handle_message(ctx, new_message, data).await {
                Ok(action) => tracing::debug!(action = %action, "Message checked"),
                Err(e) => tracing::error!("Error handling message: {}", e),
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if *is_new == Some(true) {
                if let Err(e) = long_handler::handle_guild_join(ctx, guild.id, data).await {
                    tracing::error!("Error handling guild join: {}", e);
                }
            }
        }

        _ => {}
    }

    Ok(())
}

/// Background loops for the maintenance jobs. They run until the process exits.
fn spawn_schedule(maintenance: Arc<MaintenanceService>, reset_hour: u32, backup: bool) {
    use tokio::time::sleep;

    let jobs = Arc::clone(&maintenance);
    tokio::spawn(async move {
        loop {
            sleep(RECORD_WINDOW).await;
            jobs.interval_min_10().await;
        }
    });

    let jobs = Arc::clone(&maintenance);
    tokio::spawn(async move {
        loop {
            let now = chrono::Utc::now();
            let next = schedule::next_daily(now, reset_hour);
            tracing::debug!(%next, "Next daily maintenance");
            sleep(schedule::until(now, next)).await;

            tracing::info!("Daily maintenance starting");
            jobs.update_admins().await;
            jobs.send_count().await;
            if backup {
                jobs.backup_files().await;
            }
            tracing::info!("Daily maintenance completed");
        }
    });

    let jobs = maintenance;
    tokio::spawn(async move {
        loop {
            let now = chrono::Utc::now();
            let next = schedule::next_monthly(now, reset_hour);
            tracing::info!(%next, "Next monthly reset");
            sleep(schedule::until(now, next)).await;
            jobs.reset_data().await;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env()?;

    // Keep the tables in a dedicated folder so the repo root stays tidy.
    let store = Arc::new(
        JsonTableStore::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?,
    );

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to measure message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let BotConfig {
        token,
        reset_hour,
        backup_delay,
        mut settings,
        ..
    } = config;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::long_config::long()],
            // Event handler for messages and guild joins
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up as {}", ready.user.name);

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                // ================================================================
                // DEPENDENCY INJECTION
                // ================================================================
                // The bot id is only known once the gateway says who we are, so
                // the state is built here rather than before connecting.
                settings.bot_id = ready.user.id.get();

                let peers = Arc::new(DiscordPeerChannel::new(
                    ctx.http.clone(),
                    settings.exchange_channel_id,
                    settings.hide_channel_id,
                    settings.should_hide,
                    settings.debug_channel_id,
                ));
                let directory = Arc::new(SerenityDirectory::new(ctx.http.clone()));

                let backup = settings.backup;
                let project_name = settings.project_name.clone();
                let state = Arc::new(ModerationState::new(settings, store));
                state.load().await?;
                tracing::info!(
                    groups = state.configs.len(),
                    users = state.user_ids.len(),
                    "Loaded tables"
                );

                let moderation = Arc::new(ModerationService::new(
                    Filters::new(Arc::clone(&state)),
                    peers.clone(),
                ));
                let exchange = Arc::new(ExchangeService::new(Arc::clone(&state)));
                let maintenance = Arc::new(MaintenanceService::new(
                    Arc::clone(&state),
                    directory,
                    peers,
                    backup_delay,
                ));

                presence::on_ready(ctx, &project_name);
                maintenance.update_status("awake").await;
                spawn_schedule(maintenance, reset_hour, backup);
                tracing::info!("Bot is ready");

                Ok(Data {
                    state,
                    moderation,
                    exchange,
                })
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
