// Long-message moderation service - turns predicate results into actions.
//
// This service handles:
// - Exemptions (Class C, Class E, declared messages, Class D left to peers)
// - Long text detection and the ban/delete decision
// - Recording what happened and telling peer bots about it
//
// NO Discord dependencies here - just pure domain logic.

use super::filters::Filters;
use super::moderation_models::{DataFile, InboundMessage, ModerationAction, WatchKind, WordType};
use super::moderation_ports::{fail_open, ModerationError, PeerChannel};
use super::state::{now, ModerationState};
use crate::core::exchange::ExchangeMessage;
use serde_json::json;
use std::sync::Arc;

/// Score category this bot owns.
pub const SCORE_CATEGORY: &str = "long";
/// Added to the user's score for each reported long message.
pub const SCORE_STEP: f64 = 0.6;

/// Peers interested in score changes.
pub const SCORE_RECEIVERS: &[&str] = &[
    "ANALYZE", "CAPTCHA", "CLEAN", "LANG", "NOFLOOD", "NOPORN", "NOSPAM", "RECHECK", "WARN",
];
/// Peers interested in new bad users.
pub const BAD_RECEIVERS: &[&str] = &[
    "ANALYZE", "CAPTCHA", "CLEAN", "LANG", "NOFLOOD", "NOPORN", "NOSPAM", "RECHECK", "USER",
    "WATCH",
];

pub struct ModerationService {
    filters: Filters,
    peers: Arc<dyn PeerChannel>,
}

impl ModerationService {
    pub fn new(filters: Filters, peers: Arc<dyn PeerChannel>) -> Self {
        Self { filters, peers }
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    fn state(&self) -> &Arc<ModerationState> {
        self.filters.state()
    }

    /// Whether this message is exempt from moderation.
    async fn is_exempt(&self, message: &InboundMessage) -> bool {
        let f = &self.filters;
        fail_open("Is class c", f.is_class_c(message).await)
            || fail_open("Is class e", f.is_class_e(message))
            || fail_open("Is declared message", f.is_declared_message(message).await)
            // Blacklisted senders are already being handled by peers.
            || fail_open("Is class d", f.is_class_d(message))
    }

    /// Decide what to do with a group message.
    ///
    /// Every predicate failure counts as "not matched", so an internal error
    /// can only ever make the decision more lenient.
    pub async fn evaluate(&self, message: &InboundMessage) -> ModerationAction {
        if message.sender.is_none() || self.is_exempt(message).await {
            return ModerationAction::None;
        }

        let f = &self.filters;
        if !fail_open("Is long text", f.is_long_text(message).await) {
            return ModerationAction::None;
        }

        let text = message.text().unwrap_or_default();
        let should_ban = fail_open("Is regex text", f.is_regex_text(WordType::Wb, text).await)
            || fail_open("Is watch user", f.is_watch_user(message, WatchKind::Ban))
            || fail_open("Is high score user", f.high_score(message)).is_some();
        if should_ban {
            return ModerationAction::Ban;
        }

        let delete = fail_open(
            "Get group config",
            self.state().group_config(message.chat_id).map(|c| c.delete),
        );
        if delete {
            ModerationAction::Delete
        } else {
            ModerationAction::None
        }
    }

    /// Record an action the adapter has applied.
    ///
    /// The first report of a user per recorded window raises their score and
    /// is shared with peers; repeats only refresh the detection time.
    pub async fn record_action(
        &self,
        group_id: u64,
        user_id: u64,
        action: ModerationAction,
    ) -> Result<(), ModerationError> {
        if action == ModerationAction::None {
            return Ok(());
        }

        let state = self.state();
        let first_in_window = {
            let mut region = state.message.lock().await;
            region.recorded_ids.entry(group_id).or_default().insert(user_id)
        };

        let score = {
            let mut record = state.user_ids.entry(user_id).or_default();
            record.detected.insert(group_id, now());
            let score = record.score.entry(SCORE_CATEGORY.to_string()).or_insert(0.0);
            if first_in_window && action == ModerationAction::Delete {
                *score += SCORE_STEP;
            }
            (*score * 10.0).round() / 10.0
        };
        state.save(DataFile::UserIds).await?;

        tracing::info!(group_id, user_id, action = %action, score, "Recorded long message");

        match action {
            ModerationAction::Ban => {
                if state.bad_users.insert(user_id) {
                    state.save(DataFile::BadIds).await?;
                    self.peers
                        .share(ExchangeMessage::new(
                            &state.settings.project_name,
                            BAD_RECEIVERS,
                            "add",
                            "bad",
                            json!({ "id": user_id, "type": "user" }),
                        ))
                        .await?;
                }
            }
            ModerationAction::Delete if first_in_window => {
                self.peers
                    .share(ExchangeMessage::new(
                        &state.settings.project_name,
                        SCORE_RECEIVERS,
                        "update",
                        "score",
                        json!({ "id": user_id, "score": score }),
                    ))
                    .await?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Set up a group the bot was just added to. Returns false for any other
    /// membership event.
    pub async fn join_group(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        if !self.filters.is_new_group(message)? {
            return Ok(false);
        }

        let state = self.state();
        let mut admin = state.admin.lock().await;
        if state.ensure_group(&mut admin, message.chat_id) {
            state.save_admin_tables(&admin).await?;
            drop(admin);
            state.save(DataFile::Configs).await?;
        }

        tracing::info!(group_id = message.chat_id, "Joined group");
        Ok(true)
    }

    /// Human-readable breakdown for the test group, where nothing is acted on.
    pub async fn test_report(&self, message: &InboundMessage) -> String {
        let f = &self.filters;
        let length = message.text().map(str::len).unwrap_or(0);
        let limit = self
            .state()
            .configs
            .get(&message.chat_id)
            .map(|c| c.limit.to_string())
            .unwrap_or_else(|| "unset".to_string());

        let mut lines = vec![
            format!("Length: {} bytes (limit {})", length, limit),
            format!(
                "Long: {}",
                fail_open("Is long text", f.is_long_text(message).await)
            ),
        ];
        let text = message.text().unwrap_or_default();
        for word in WordType::ALL {
            if fail_open("Is regex text", f.is_regex_text(word, text).await) {
                lines.push(format!("Lexicon hit: {}", word));
            }
        }
        if let Some(score) = fail_open("Is high score user", f.high_score(message)) {
            lines.push(format!("High score: {:.1}", score));
        }
        lines.join("\n")
    }
}
