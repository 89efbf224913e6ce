// Moderation domain models - data structures for the long-message guard.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts serenity types into `InboundMessage` and
// turns `ModerationAction` back into Discord calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// MESSAGES
// ============================================================================

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    /// True when the bot itself is the author.
    pub is_self: bool,
}

/// Platform-agnostic view of an incoming message or membership event.
///
/// Only the fields the predicates look at are carried over.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub message_id: u64,
    /// The group (or channel) the message was posted in.
    pub chat_id: u64,
    pub sender: Option<Sender>,
    /// Original author when the message was forwarded from a user.
    pub forward_from_user: Option<u64>,
    /// Source channel when the message was forwarded from a broadcast channel.
    pub forward_from_channel: Option<u64>,
    /// Extracted text (content plus anything else the adapter considers text).
    pub text: Option<String>,
    /// Users that joined with this event.
    pub new_members: Vec<u64>,
    /// The event is the creation of the group itself.
    pub group_created: bool,
}

impl InboundMessage {
    pub fn sender_id(&self) -> Option<u64> {
        self.sender.map(|s| s.id)
    }

    /// The extracted text, or `None` if there is nothing to measure.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// What should happen to a message after the predicates ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Leave the message alone
    None,
    /// Delete the message and record the user
    Delete,
    /// Delete the message and ban the user
    Ban,
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationAction::None => write!(f, "none"),
            ModerationAction::Delete => write!(f, "delete"),
            ModerationAction::Ban => write!(f, "ban"),
        }
    }
}

// ============================================================================
// LEXICONS & WATCH LISTS
// ============================================================================

/// Name of a regex lexicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordType {
    /// Advertising
    Ad,
    /// Instant ban
    Ban,
    /// Profile bios
    Bio,
    /// Contact details
    Con,
    /// Instant delete
    Del,
    /// Display names
    Nm,
    /// Generic spam
    Spam,
    /// Watch-ban words
    Wb,
}

impl WordType {
    pub const ALL: [WordType; 8] = [
        WordType::Ad,
        WordType::Ban,
        WordType::Bio,
        WordType::Con,
        WordType::Del,
        WordType::Nm,
        WordType::Spam,
        WordType::Wb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WordType::Ad => "ad",
            WordType::Ban => "ban",
            WordType::Bio => "bio",
            WordType::Con => "con",
            WordType::Del => "del",
            WordType::Nm => "nm",
            WordType::Spam => "spam",
            WordType::Wb => "wb",
        }
    }
}

impl fmt::Display for WordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WordType::ALL
            .iter()
            .copied()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| format!("unknown word type: {}", s))
    }
}

/// Which watch list a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    Ban,
    Delete,
}

impl WatchKind {
    pub const ALL: [WatchKind; 2] = [WatchKind::Ban, WatchKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchKind::Ban => "ban",
            WatchKind::Delete => "delete",
        }
    }
}

// ============================================================================
// PERSISTED TABLES
// ============================================================================

/// Every table the bot persists. Also the unit of backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFile {
    AdminIds,
    BadIds,
    Configs,
    ExceptIds,
    TrustIds,
    UserIds,
    WatchIds,
    Words(WordType),
}

impl DataFile {
    /// All tables, in backup order.
    pub fn all() -> Vec<DataFile> {
        let mut files = vec![
            DataFile::AdminIds,
            DataFile::BadIds,
            DataFile::Configs,
            DataFile::ExceptIds,
            DataFile::TrustIds,
            DataFile::UserIds,
            DataFile::WatchIds,
        ];
        files.extend(WordType::ALL.iter().map(|w| DataFile::Words(*w)));
        files
    }

    pub fn name(&self) -> String {
        match self {
            DataFile::AdminIds => "admin_ids".to_string(),
            DataFile::BadIds => "bad_ids".to_string(),
            DataFile::Configs => "configs".to_string(),
            DataFile::ExceptIds => "except_ids".to_string(),
            DataFile::TrustIds => "trust_ids".to_string(),
            DataFile::UserIds => "user_ids".to_string(),
            DataFile::WatchIds => "watch_ids".to_string(),
            DataFile::Words(word) => format!("{}_words", word),
        }
    }
}

// ============================================================================
// GROUPS & USERS
// ============================================================================

/// Per-group settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Still on the defaults (no admin changed anything)
    pub default: bool,
    /// Byte length at which a message counts as long
    pub limit: usize,
    /// Whether long messages are deleted
    pub delete: bool,
}

impl GroupConfig {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            default: true,
            limit,
            delete: true,
        }
    }
}

/// Everything we remember about a single user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Group id -> unix timestamp of the last detection there
    #[serde(default)]
    pub detected: HashMap<u64, i64>,
    /// Penalty category -> score
    #[serde(default)]
    pub score: HashMap<String, f64>,
}

/// One entry of a group's admin roster as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminMember {
    pub user_id: u64,
    pub is_creator: bool,
    pub can_delete_messages: bool,
    pub can_restrict_members: bool,
}

impl AdminMember {
    /// Admins that count for moderation purposes.
    pub fn is_effective_admin(&self) -> bool {
        self.is_creator || (self.can_delete_messages && self.can_restrict_members)
    }
}

/// Which penalty categories make up a user's total score, and where the
/// high-score cutoff sits.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub categories: Vec<String>,
    pub threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            categories: [
                "captcha", "clean", "lang", "long", "noflood", "noporn", "nospam", "recheck",
                "warn",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            threshold: 3.0,
        }
    }
}

impl ScoringPolicy {
    /// Sum of the record's scores over the policy's categories.
    pub fn total(&self, record: &UserRecord) -> f64 {
        self.categories
            .iter()
            .map(|c| record.score.get(c).copied().unwrap_or(0.0))
            .sum()
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Identity and policy knobs the core needs. Built from `BotConfig` in main.
#[derive(Debug, Clone)]
pub struct ModerationSettings {
    /// Name this bot uses on the exchange channel
    pub project_name: String,
    /// Our own user id
    pub bot_id: u64,
    /// Peer bot that must be admin in every group
    pub user_bot_id: u64,
    /// Peer anti-spam bot, added to admin sets when present
    pub nospam_bot_id: u64,
    /// Other peer bots exempt from moderation
    pub peer_bot_ids: Vec<u64>,
    pub exchange_channel_id: u64,
    pub hide_channel_id: u64,
    pub should_hide: bool,
    pub debug_channel_id: u64,
    pub test_group_id: u64,
    pub default_limit: usize,
    /// Seconds a detection keeps a user flagged in a group
    pub punish_time: i64,
    pub backup: bool,
    pub scoring: ScoringPolicy,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            project_name: "LONG".to_string(),
            bot_id: 0,
            user_bot_id: 0,
            nospam_bot_id: 0,
            peer_bot_ids: Vec::new(),
            exchange_channel_id: 0,
            hide_channel_id: 0,
            should_hide: false,
            debug_channel_id: 0,
            test_group_id: 0,
            default_limit: 1500,
            punish_time: 600,
            backup: false,
            scoring: ScoringPolicy::default(),
        }
    }
}
