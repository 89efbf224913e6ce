// Classification predicates.
//
// Every predicate returns a `Result` so callers can tell "not matched" from
// "something broke". The message handler runs them through `fail_open`,
// which logs the error and treats the message as not matched.

use super::moderation_models::{DataFile, InboundMessage, WatchKind, WordType};
use super::moderation_ports::ModerationError;
use super::state::{now, ModerationState};
use std::sync::Arc;

#[derive(Clone)]
pub struct Filters {
    state: Arc<ModerationState>,
}

impl Filters {
    pub fn new(state: Arc<ModerationState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ModerationState> {
        &self.state
    }

    // ------------------------------------------------------------------------
    // Trust tiers
    // ------------------------------------------------------------------------

    /// Class C: the sender is a group admin, a peer bot, or ourselves.
    ///
    /// Seeing a group for the first time creates its tables.
    pub async fn is_class_c(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        let Some(sender) = message.sender else {
            return Ok(false);
        };

        let mut admin = self.state.admin.lock().await;
        if self.state.ensure_group(&mut admin, message.chat_id) {
            tracing::info!(group_id = message.chat_id, "Initialized new group");
            self.state.save_admin_tables(&admin).await?;
            self.state.save(DataFile::Configs).await?;
        }

        let is_admin = admin
            .admin_ids
            .get(&message.chat_id)
            .is_some_and(|ids| ids.contains(&sender.id));

        Ok(is_admin || self.state.bot_ids.contains(&sender.id) || sender.is_self)
    }

    /// Class D: the sender, or where the message was forwarded from, is
    /// blacklisted.
    pub fn is_class_d(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        if let Some(uid) = message.sender_id() {
            if self.state.bad_users.contains(&uid) {
                return Ok(true);
            }
        }

        if let Some(fid) = message.forward_from_user {
            if self.state.bad_users.contains(&fid) {
                return Ok(true);
            }
        }

        if let Some(cid) = message.forward_from_channel {
            if self.state.bad_channels.contains(&cid) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Class E: forwarded from an excepted channel.
    pub fn is_class_e(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        Ok(message
            .forward_from_channel
            .is_some_and(|cid| self.state.except_channels.contains(&cid)))
    }

    /// Another bot already declared it will handle this message.
    pub async fn is_declared_message(
        &self,
        message: &InboundMessage,
    ) -> Result<bool, ModerationError> {
        let region = self.state.message.lock().await;
        Ok(region
            .declared_message_ids
            .get(&message.chat_id)
            .is_some_and(|ids| ids.contains(&message.message_id)))
    }

    /// Posted in the channel peer bots exchange data on.
    pub fn is_exchange_channel(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        let settings = &self.state.settings;
        if settings.should_hide {
            Ok(message.chat_id == settings.hide_channel_id)
        } else {
            Ok(message.chat_id == settings.exchange_channel_id)
        }
    }

    pub fn is_hide_channel(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        Ok(message.chat_id == self.state.settings.hide_channel_id)
    }

    /// We were added to a group, or a group was created with us in it.
    pub fn is_new_group(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        if !message.new_members.is_empty() {
            let bot_id = self.state.settings.bot_id;
            return Ok(message.new_members.iter().any(|id| *id == bot_id));
        }

        Ok(message.group_created)
    }

    pub fn is_test_group(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        Ok(message.chat_id == self.state.settings.test_group_id)
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub fn is_detected_user(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        match message.sender_id() {
            Some(uid) => self.is_detected_user_id(message.chat_id, uid),
            None => Ok(false),
        }
    }

    /// The user was detected in `group_id` within the punish window.
    pub fn is_detected_user_id(&self, group_id: u64, user_id: u64) -> Result<bool, ModerationError> {
        let Some(record) = self.state.user_ids.get(&user_id) else {
            return Ok(false);
        };

        let detected = record.detected.get(&group_id).copied().unwrap_or(0);
        Ok(now() - detected < self.state.settings.punish_time)
    }

    /// Total penalty score if it reaches the policy threshold.
    pub fn high_score(&self, message: &InboundMessage) -> Result<Option<f64>, ModerationError> {
        let Some(uid) = message.sender_id() else {
            return Ok(None);
        };
        let Some(record) = self.state.user_ids.get(&uid) else {
            return Ok(None);
        };

        let policy = &self.state.settings.scoring;
        let score = policy.total(&record);
        Ok((score >= policy.threshold).then_some(score))
    }

    /// The user is on the `kind` watch list and it has not expired.
    pub fn is_watch_user(
        &self,
        message: &InboundMessage,
        kind: WatchKind,
    ) -> Result<bool, ModerationError> {
        let Some(uid) = message.sender_id() else {
            return Ok(false);
        };

        let until = self.state.watch(kind).get(&uid).map(|u| *u).unwrap_or(0);
        Ok(now() < until)
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// The message text is at least the group's byte limit, or the sender
    /// was detected recently.
    pub async fn is_long_text(&self, message: &InboundMessage) -> Result<bool, ModerationError> {
        let _region = self.state.message.lock().await;

        let Some(text) = message.text() else {
            return Ok(false);
        };

        if self.is_detected_user(message)? {
            return Ok(true);
        }

        let config = self.state.group_config(message.chat_id)?;
        Ok(text.len() >= config.limit)
    }

    /// Run `text` against the `word_type` lexicon. A hit bumps the pattern's
    /// counter and persists the lexicon.
    pub async fn is_regex_text(
        &self,
        word_type: WordType,
        text: &str,
    ) -> Result<bool, ModerationError> {
        if text.is_empty() {
            return Ok(false);
        }

        let mut lexicons = self.state.regex.lock().await;
        let Some(lexicon) = lexicons.get_mut(&word_type) else {
            return Ok(false);
        };

        match lexicon.record_first_match(text) {
            Some(pattern) => {
                tracing::debug!(word_type = %word_type, pattern = %pattern, "Lexicon hit");
                self.state.save_words(word_type, lexicon).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::lexicon::Lexicon;
    use crate::core::moderation::moderation_models::{GroupConfig, Sender, UserRecord};
    use crate::core::moderation::testing::*;
    use std::collections::HashSet;

    const GROUP: u64 = 77;

    fn message_from(uid: u64) -> InboundMessage {
        InboundMessage {
            message_id: 1,
            chat_id: GROUP,
            sender: Some(Sender {
                id: uid,
                is_self: false,
            }),
            ..Default::default()
        }
    }

    fn text_message(uid: u64, text: &str) -> InboundMessage {
        InboundMessage {
            text: Some(text.to_string()),
            ..message_from(uid)
        }
    }

    fn filters() -> (Filters, Arc<MemoryTableStore>) {
        let (state, store) = test_state();
        (Filters::new(state), store)
    }

    #[tokio::test]
    async fn class_c_covers_admins_and_bots_only() {
        let (filters, _) = filters();
        filters
            .state()
            .admin
            .lock()
            .await
            .admin_ids
            .insert(GROUP, HashSet::from([5, 6]));

        for uid in [5, 6, USER_BOT_ID, NOSPAM_BOT_ID] {
            assert!(filters.is_class_c(&message_from(uid)).await.unwrap(), "{uid}");
        }
        for uid in [1, 2, 7] {
            assert!(!filters.is_class_c(&message_from(uid)).await.unwrap(), "{uid}");
        }
    }

    #[tokio::test]
    async fn class_c_counts_ourselves() {
        let (filters, _) = filters();
        let mut message = message_from(BOT_ID);
        message.sender = Some(Sender {
            id: BOT_ID,
            is_self: true,
        });
        assert!(filters.is_class_c(&message).await.unwrap());
    }

    #[tokio::test]
    async fn class_c_initializes_unknown_groups() {
        let (filters, store) = filters();
        assert!(!filters.is_class_c(&message_from(1)).await.unwrap());

        assert!(filters.state().configs.contains_key(&GROUP));
        assert!(store.saved(DataFile::AdminIds).is_some());
        assert!(store.saved(DataFile::Configs).is_some());
    }

    #[tokio::test]
    async fn class_c_without_sender_is_false() {
        let (filters, _) = filters();
        let message = InboundMessage {
            chat_id: GROUP,
            ..Default::default()
        };
        assert!(!filters.is_class_c(&message).await.unwrap());
    }

    #[test]
    fn class_d_checks_sender_and_forward_origins() {
        let (filters, _) = filters();
        filters.state().bad_users.insert(10);
        filters.state().bad_channels.insert(20);

        assert!(filters.is_class_d(&message_from(10)).unwrap());
        assert!(!filters.is_class_d(&message_from(11)).unwrap());

        let mut forwarded = message_from(11);
        forwarded.forward_from_user = Some(10);
        assert!(filters.is_class_d(&forwarded).unwrap());

        let mut from_channel = message_from(11);
        from_channel.forward_from_channel = Some(20);
        assert!(filters.is_class_d(&from_channel).unwrap());

        // A bad user id in the channel slot does not count.
        from_channel.forward_from_channel = Some(10);
        assert!(!filters.is_class_d(&from_channel).unwrap());
    }

    #[test]
    fn class_e_only_for_excepted_channels() {
        let (filters, _) = filters();
        filters.state().except_channels.insert(30);

        let mut message = message_from(1);
        assert!(!filters.is_class_e(&message).unwrap());
        message.forward_from_channel = Some(30);
        assert!(filters.is_class_e(&message).unwrap());
        message.forward_from_channel = Some(31);
        assert!(!filters.is_class_e(&message).unwrap());
    }

    #[tokio::test]
    async fn declared_messages_are_per_group() {
        let (filters, _) = filters();
        filters
            .state()
            .message
            .lock()
            .await
            .declared_message_ids
            .insert(GROUP, HashSet::from([1]));

        assert!(filters.is_declared_message(&message_from(5)).await.unwrap());

        let mut elsewhere = message_from(5);
        elsewhere.chat_id = GROUP + 1;
        assert!(!filters.is_declared_message(&elsewhere).await.unwrap());
    }

    #[test]
    fn channel_predicates() {
        let (filters, _) = filters();
        let mut message = message_from(1);

        message.chat_id = EXCHANGE_CHANNEL;
        assert!(filters.is_exchange_channel(&message).unwrap());
        assert!(!filters.is_hide_channel(&message).unwrap());

        message.chat_id = HIDE_CHANNEL;
        assert!(!filters.is_exchange_channel(&message).unwrap());
        assert!(filters.is_hide_channel(&message).unwrap());

        message.chat_id = TEST_GROUP;
        assert!(filters.is_test_group(&message).unwrap());
    }

    #[test]
    fn hidden_mode_moves_the_exchange_channel() {
        let store = Arc::new(MemoryTableStore::new());
        let mut settings = test_settings();
        settings.should_hide = true;
        let filters = Filters::new(Arc::new(ModerationState::new(settings, store)));

        let mut message = message_from(1);
        message.chat_id = HIDE_CHANNEL;
        assert!(filters.is_exchange_channel(&message).unwrap());
        message.chat_id = EXCHANGE_CHANNEL;
        assert!(!filters.is_exchange_channel(&message).unwrap());
    }

    #[test]
    fn new_group_detection() {
        let (filters, _) = filters();
        let mut event = InboundMessage {
            chat_id: GROUP,
            new_members: vec![3, BOT_ID],
            ..Default::default()
        };
        assert!(filters.is_new_group(&event).unwrap());

        event.new_members = vec![3];
        assert!(!filters.is_new_group(&event).unwrap());

        event.new_members.clear();
        event.group_created = true;
        assert!(filters.is_new_group(&event).unwrap());
    }

    #[tokio::test]
    async fn long_text_threshold_is_inclusive() {
        let (filters, _) = filters();
        filters
            .state()
            .configs
            .insert(GROUP, GroupConfig::with_limit(10));

        assert!(filters
            .is_long_text(&text_message(1, "0123456789"))
            .await
            .unwrap());
        assert!(!filters
            .is_long_text(&text_message(1, "012345678"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn long_text_counts_utf8_bytes() {
        let (filters, _) = filters();
        filters
            .state()
            .configs
            .insert(GROUP, GroupConfig::with_limit(6));

        // Two characters, six bytes.
        assert!(filters.is_long_text(&text_message(1, "日本")).await.unwrap());
        // Five characters, five bytes.
        assert!(!filters.is_long_text(&text_message(1, "abcde")).await.unwrap());
    }

    #[tokio::test]
    async fn detected_users_short_circuit_the_length_check() {
        let (filters, _) = filters();
        filters
            .state()
            .configs
            .insert(GROUP, GroupConfig::with_limit(1000));
        let mut record = UserRecord::default();
        record.detected.insert(GROUP, now());
        filters.state().user_ids.insert(1, record);

        assert!(filters.is_long_text(&text_message(1, "hi")).await.unwrap());
        assert!(!filters.is_long_text(&text_message(2, "hi")).await.unwrap());
    }

    #[tokio::test]
    async fn expired_detection_does_not_count() {
        let (filters, _) = filters();
        let mut record = UserRecord::default();
        record
            .detected
            .insert(GROUP, now() - filters.state().settings.punish_time - 1);
        filters.state().user_ids.insert(1, record);

        assert!(!filters.is_detected_user_id(GROUP, 1).unwrap());
    }

    #[tokio::test]
    async fn long_text_without_text_is_false() {
        let (filters, _) = filters();
        assert!(!filters.is_long_text(&message_from(1)).await.unwrap());
    }

    #[tokio::test]
    async fn long_text_without_config_is_an_error() {
        let (filters, _) = filters();
        let result = filters.is_long_text(&text_message(1, "text")).await;
        assert!(matches!(result, Err(ModerationError::MissingConfig(GROUP))));
    }

    #[test]
    fn high_score_threshold() {
        let (filters, _) = filters();
        let mut record = UserRecord::default();
        record.score.insert("long".into(), 1.0);
        record.score.insert("nospam".into(), 1.5);
        record.score.insert("warn".into(), 0.5);
        filters.state().user_ids.insert(1, record);

        let score = filters.high_score(&message_from(1)).unwrap();
        assert!(score.is_some_and(|s| s >= 3.0));

        let mut record = UserRecord::default();
        record.score.insert("long".into(), 2.49);
        record.score.insert("captcha".into(), 0.5);
        filters.state().user_ids.insert(2, record);
        assert_eq!(filters.high_score(&message_from(2)).unwrap(), None);

        assert_eq!(filters.high_score(&message_from(3)).unwrap(), None);
    }

    #[test]
    fn watch_lists_respect_expiry() {
        let (filters, _) = filters();
        filters.state().watch(WatchKind::Ban).insert(1, now() + 60);
        filters.state().watch(WatchKind::Delete).insert(2, now() - 60);

        assert!(filters.is_watch_user(&message_from(1), WatchKind::Ban).unwrap());
        assert!(!filters.is_watch_user(&message_from(1), WatchKind::Delete).unwrap());
        assert!(!filters.is_watch_user(&message_from(2), WatchKind::Delete).unwrap());
    }

    #[tokio::test]
    async fn regex_hit_after_stripping_counts_once_per_call() {
        let (filters, store) = filters();
        filters
            .state()
            .regex
            .lock()
            .await
            .insert(WordType::Spam, Lexicon::from_patterns(["casinobonus"]));

        assert!(filters
            .is_regex_text(WordType::Spam, "casino\n  bonus today")
            .await
            .unwrap());
        assert_eq!(
            filters.state().regex.lock().await[&WordType::Spam].hits("casinobonus"),
            Some(1)
        );

        assert!(filters
            .is_regex_text(WordType::Spam, "c a s i n o b o n u s")
            .await
            .unwrap());
        assert_eq!(
            filters.state().regex.lock().await[&WordType::Spam].hits("casinobonus"),
            Some(2)
        );
        assert_eq!(store.save_count(DataFile::Words(WordType::Spam)), 2);
    }

    #[tokio::test]
    async fn regex_miss_does_not_persist() {
        let (filters, store) = filters();
        filters
            .state()
            .regex
            .lock()
            .await
            .insert(WordType::Ban, Lexicon::from_patterns(["forbidden"]));

        assert!(!filters
            .is_regex_text(WordType::Ban, "perfectly fine")
            .await
            .unwrap());
        assert!(!filters.is_regex_text(WordType::Ban, "").await.unwrap());
        assert_eq!(store.save_count(DataFile::Words(WordType::Ban)), 0);
    }
}
