// Applies envelopes received from peer bots on the exchange channel.

use super::exchange_models::ExchangeMessage;
use crate::core::moderation::{DataFile, ModerationError, ModerationState, WatchKind, WordType};
use dashmap::DashSet;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct IdData {
    id: u64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DeclareData {
    group_id: u64,
    message_id: u64,
}

#[derive(Debug, Deserialize)]
struct ScoreData {
    id: u64,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct WatchData {
    id: u64,
    #[serde(rename = "type")]
    kind: WatchKind,
    #[serde(default)]
    until: i64,
}

#[derive(Debug, Deserialize)]
struct RegexData {
    #[serde(rename = "type")]
    word_type: String,
    patterns: Vec<String>,
}

fn parse<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ModerationError> {
    Ok(serde_json::from_value(data)?)
}

/// Pick the user or channel set named by an id envelope's `type`.
fn id_set<'a>(
    kind: &str,
    users: &'a DashSet<u64>,
    channels: &'a DashSet<u64>,
) -> Result<&'a DashSet<u64>, ModerationError> {
    match kind {
        "user" => Ok(users),
        "channel" => Ok(channels),
        other => Err(ModerationError::InvalidData(format!(
            "unknown id type: {}",
            other
        ))),
    }
}

/// What a received envelope did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Not for us
    Ignored,
    /// Addressed to us but not an action we handle
    Unhandled,
    Applied,
}

pub struct ExchangeService {
    state: Arc<ModerationState>,
}

impl ExchangeService {
    pub fn new(state: Arc<ModerationState>) -> Self {
        Self { state }
    }

    /// Parse and apply one raw exchange-channel post.
    pub async fn receive_text(&self, text: &str) -> Result<ReceiveOutcome, ModerationError> {
        let message: ExchangeMessage = serde_json::from_str(text)?;
        self.receive(message).await
    }

    pub async fn receive(&self, message: ExchangeMessage) -> Result<ReceiveOutcome, ModerationError> {
        let state = &self.state;
        if !message.is_addressed_to(&state.settings.project_name) {
            return Ok(ReceiveOutcome::Ignored);
        }

        tracing::debug!(
            from = %message.from,
            action = %message.action,
            action_type = %message.action_type,
            "Received exchange data"
        );

        match (message.action.as_str(), message.action_type.as_str()) {
            ("add", "bad") | ("remove", "bad") => {
                let data: IdData = parse(message.data)?;
                let set = id_set(&data.kind, &state.bad_users, &state.bad_channels)?;
                if message.action == "add" {
                    set.insert(data.id);
                } else {
                    set.remove(&data.id);
                }
                state.save(DataFile::BadIds).await?;
            }
            ("add", "except") | ("remove", "except") => {
                let data: IdData = parse(message.data)?;
                let set = id_set(&data.kind, &state.except_users, &state.except_channels)?;
                if message.action == "add" {
                    set.insert(data.id);
                } else {
                    set.remove(&data.id);
                }
                state.save(DataFile::ExceptIds).await?;
            }
            ("update", "declare") => {
                let data: DeclareData = parse(message.data)?;
                let mut region = state.message.lock().await;
                region
                    .declared_message_ids
                    .entry(data.group_id)
                    .or_default()
                    .insert(data.message_id);
            }
            ("update", "score") => {
                let data: ScoreData = parse(message.data)?;
                let category = message.from.to_lowercase();
                state
                    .user_ids
                    .entry(data.id)
                    .or_default()
                    .score
                    .insert(category, data.score);
                state.save(DataFile::UserIds).await?;
            }
            ("add", "watch") => {
                let data: WatchData = parse(message.data)?;
                state.watch(data.kind).insert(data.id, data.until);
                state.save(DataFile::WatchIds).await?;
            }
            ("remove", "watch") => {
                let data: IdData = parse(message.data)?;
                for kind in WatchKind::ALL {
                    if data.kind == "all" || data.kind == kind.as_str() {
                        state.watch(kind).remove(&data.id);
                    }
                }
                state.save(DataFile::WatchIds).await?;
            }
            ("regex", "update") => {
                let data: RegexData = parse(message.data)?;
                let word_type: WordType = data
                    .word_type
                    .parse()
                    .map_err(ModerationError::InvalidData)?;
                let mut lexicons = state.regex.lock().await;
                let lexicon = lexicons.entry(word_type).or_default();
                lexicon.replace_patterns(data.patterns);
                state.save_words(word_type, lexicon).await?;
                tracing::info!(word_type = %word_type, patterns = lexicon.len(), "Lexicon updated");
            }
            (action, action_type) => {
                tracing::debug!(action, action_type, "Unhandled exchange action");
                return Ok(ReceiveOutcome::Unhandled);
            }
        }

        Ok(ReceiveOutcome::Applied)
    }
}
