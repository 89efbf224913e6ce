// Environment-driven configuration.
//
// Everything comes from environment variables; a `.env` file is loaded first
// if present. Missing ids default to 0, which disables whatever uses them.

use crate::core::moderation::{ModerationSettings, ScoringPolicy};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub struct BotConfig {
    pub token: String,
    pub data_dir: PathBuf,
    /// Hour (UTC) the daily and monthly jobs run at
    pub reset_hour: u32,
    pub backup_delay: Duration,
    pub settings: ModerationSettings,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

fn id_list(key: &str) -> Result<Vec<u64>> {
    let raw = std::env::var(key).unwrap_or_default();
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("Invalid id in {}: {:?}", key, s))
        })
        .collect()
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let token = std::env::var("DISCORD_TOKEN").context(
            "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
        )?;

        let defaults = ModerationSettings::default();
        let settings = ModerationSettings {
            project_name: var_or("PROJECT_NAME", defaults.project_name)?,
            // Filled in from the gateway once we know who we are.
            bot_id: 0,
            user_bot_id: var_or("USER_BOT_ID", 0)?,
            nospam_bot_id: var_or("NOSPAM_BOT_ID", 0)?,
            peer_bot_ids: id_list("PEER_BOT_IDS")?,
            exchange_channel_id: var_or("EXCHANGE_CHANNEL_ID", 0)?,
            hide_channel_id: var_or("HIDE_CHANNEL_ID", 0)?,
            should_hide: var_or("SHOULD_HIDE", false)?,
            debug_channel_id: var_or("DEBUG_CHANNEL_ID", 0)?,
            test_group_id: var_or("TEST_GROUP_ID", 0)?,
            default_limit: var_or("DEFAULT_LIMIT", defaults.default_limit)?,
            punish_time: var_or("PUNISH_TIME", defaults.punish_time)?,
            backup: var_or("BACKUP", false)?,
            scoring: ScoringPolicy::default(),
        };

        let reset_hour: u32 = var_or("RESET_HOUR", 0)?;
        anyhow::ensure!(reset_hour < 24, "RESET_HOUR must be between 0 and 23");
        anyhow::ensure!(settings.default_limit > 0, "DEFAULT_LIMIT must be positive");

        Ok(Self {
            token,
            data_dir: var_or("DATA_DIR", PathBuf::from("data"))?,
            reset_hour,
            backup_delay: Duration::from_secs(var_or("BACKUP_DELAY_SECS", 5)?),
            settings,
        })
    }
}
