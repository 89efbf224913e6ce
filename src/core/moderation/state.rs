// Shared moderation state.
//
// One `ModerationState` is created at startup and handed to every service by
// `Arc`. Three regions sit behind their own mutex:
// - `message`: recorded users and declared messages
// - `admin`: admin and trust sets
// - `regex`: lexicons and their hit counters
// Holders keep the guard for the whole critical section and never take a
// second region while holding one. Everything else is plain membership data
// kept in DashMap/DashSet.

use super::lexicon::Lexicon;
use super::moderation_models::{
    DataFile, GroupConfig, ModerationSettings, UserRecord, WatchKind, WordType,
};
use super::moderation_ports::{ModerationError, TableStore};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Current unix timestamp in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Default)]
pub struct MessageRegion {
    /// Group id -> users already reported in the current window
    pub recorded_ids: HashMap<u64, HashSet<u64>>,
    /// Group id -> message ids other bots said they will handle
    pub declared_message_ids: HashMap<u64, HashSet<u64>>,
}

#[derive(Debug, Default)]
pub struct AdminRegion {
    pub admin_ids: HashMap<u64, HashSet<u64>>,
    pub trust_ids: HashMap<u64, HashSet<u64>>,
}

impl AdminRegion {
    fn snapshot(map: &HashMap<u64, HashSet<u64>>) -> BTreeMap<u64, BTreeSet<u64>> {
        map.iter()
            .map(|(gid, ids)| (*gid, ids.iter().copied().collect()))
            .collect()
    }
}

pub type Lexicons = HashMap<WordType, Lexicon>;

/// On-disk shape of `bad_ids` and `except_ids`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IdSets {
    #[serde(default)]
    users: BTreeSet<u64>,
    #[serde(default)]
    channels: BTreeSet<u64>,
}

/// On-disk shape of `watch_ids`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WatchTable {
    #[serde(default)]
    ban: BTreeMap<u64, i64>,
    #[serde(default)]
    delete: BTreeMap<u64, i64>,
}

fn collect_set(set: &DashSet<u64>) -> BTreeSet<u64> {
    set.iter().map(|id| *id).collect()
}

fn refill_set(set: &DashSet<u64>, ids: impl IntoIterator<Item = u64>) {
    set.clear();
    for id in ids {
        set.insert(id);
    }
}

pub struct ModerationState {
    pub settings: ModerationSettings,
    store: Arc<dyn TableStore>,

    pub message: Mutex<MessageRegion>,
    pub admin: Mutex<AdminRegion>,
    pub regex: Mutex<Lexicons>,

    pub bad_users: DashSet<u64>,
    pub bad_channels: DashSet<u64>,
    pub except_users: DashSet<u64>,
    pub except_channels: DashSet<u64>,
    /// Peer bots, exempt everywhere
    pub bot_ids: DashSet<u64>,
    pub user_ids: DashMap<u64, UserRecord>,
    pub configs: DashMap<u64, GroupConfig>,
    watch_ban: DashMap<u64, i64>,
    watch_delete: DashMap<u64, i64>,
}

impl ModerationState {
    pub fn new(settings: ModerationSettings, store: Arc<dyn TableStore>) -> Self {
        let bot_ids = DashSet::new();
        for id in [settings.user_bot_id, settings.nospam_bot_id]
            .into_iter()
            .chain(settings.peer_bot_ids.iter().copied())
            .filter(|id| *id != 0)
        {
            bot_ids.insert(id);
        }

        let lexicons = WordType::ALL
            .iter()
            .map(|w| (*w, Lexicon::new()))
            .collect();

        Self {
            settings,
            store,
            message: Mutex::new(MessageRegion::default()),
            admin: Mutex::new(AdminRegion::default()),
            regex: Mutex::new(lexicons),
            bad_users: DashSet::new(),
            bad_channels: DashSet::new(),
            except_users: DashSet::new(),
            except_channels: DashSet::new(),
            bot_ids,
            user_ids: DashMap::new(),
            configs: DashMap::new(),
            watch_ban: DashMap::new(),
            watch_delete: DashMap::new(),
        }
    }

    pub fn watch(&self, kind: WatchKind) -> &DashMap<u64, i64> {
        match kind {
            WatchKind::Ban => &self.watch_ban,
            WatchKind::Delete => &self.watch_delete,
        }
    }

    pub fn group_config(&self, group_id: u64) -> Result<GroupConfig, ModerationError> {
        self.configs
            .get(&group_id)
            .map(|c| c.clone())
            .ok_or(ModerationError::MissingConfig(group_id))
    }

    /// Create the per-group tables on first sight. Returns true if the group
    /// was new.
    pub fn ensure_group(&self, admin: &mut AdminRegion, group_id: u64) -> bool {
        if admin.admin_ids.contains_key(&group_id) {
            return false;
        }

        admin.admin_ids.insert(group_id, HashSet::new());
        admin.trust_ids.entry(group_id).or_default();
        self.configs
            .entry(group_id)
            .or_insert_with(|| GroupConfig::with_limit(self.settings.default_limit));
        true
    }

    /// Apply `change` to the group's config, mark it as customised and
    /// persist the configs table.
    pub async fn update_config(
        &self,
        group_id: u64,
        change: impl FnOnce(&mut GroupConfig),
    ) -> Result<GroupConfig, ModerationError> {
        let config = {
            let mut entry = self
                .configs
                .entry(group_id)
                .or_insert_with(|| GroupConfig::with_limit(self.settings.default_limit));
            change(&mut entry);
            entry.default = false;
            entry.clone()
        };
        self.save(DataFile::Configs).await?;
        Ok(config)
    }

    /// Put the group back on the defaults.
    pub async fn reset_config(&self, group_id: u64) -> Result<GroupConfig, ModerationError> {
        let config = GroupConfig::with_limit(self.settings.default_limit);
        self.configs.insert(group_id, config.clone());
        self.save(DataFile::Configs).await?;
        Ok(config)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Populate the state from the table store. Missing tables are skipped.
    pub async fn load(&self) -> Result<(), ModerationError> {
        for file in DataFile::all() {
            let Some(value) = self.store.load(file).await? else {
                continue;
            };
            self.apply(file, value).await?;
            tracing::debug!(table = %file.name(), "Loaded table");
        }
        Ok(())
    }

    async fn apply(&self, file: DataFile, value: Value) -> Result<(), ModerationError> {
        match file {
            DataFile::AdminIds | DataFile::TrustIds => {
                let map: HashMap<u64, HashSet<u64>> = serde_json::from_value(value)?;
                let mut admin = self.admin.lock().await;
                if file == DataFile::AdminIds {
                    admin.admin_ids = map;
                } else {
                    admin.trust_ids = map;
                }
            }
            DataFile::BadIds => {
                let sets: IdSets = serde_json::from_value(value)?;
                refill_set(&self.bad_users, sets.users);
                refill_set(&self.bad_channels, sets.channels);
            }
            DataFile::ExceptIds => {
                let sets: IdSets = serde_json::from_value(value)?;
                refill_set(&self.except_users, sets.users);
                refill_set(&self.except_channels, sets.channels);
            }
            DataFile::Configs => {
                let map: HashMap<u64, GroupConfig> = serde_json::from_value(value)?;
                self.configs.clear();
                for (gid, config) in map {
                    self.configs.insert(gid, config);
                }
            }
            DataFile::UserIds => {
                let map: HashMap<u64, UserRecord> = serde_json::from_value(value)?;
                self.user_ids.clear();
                for (uid, record) in map {
                    self.user_ids.insert(uid, record);
                }
            }
            DataFile::WatchIds => {
                let table: WatchTable = serde_json::from_value(value)?;
                for (kind, entries) in [
                    (WatchKind::Ban, table.ban),
                    (WatchKind::Delete, table.delete),
                ] {
                    let watch = self.watch(kind);
                    watch.clear();
                    for (uid, until) in entries {
                        watch.insert(uid, until);
                    }
                }
            }
            DataFile::Words(word) => {
                let lexicon: Lexicon = serde_json::from_value(value)?;
                self.regex.lock().await.insert(word, lexicon);
            }
        }
        Ok(())
    }

    /// Serialized contents of `file`.
    ///
    /// Locks the owning region for admin, trust and word tables, so it must
    /// not be called while that region is held.
    pub async fn snapshot(&self, file: DataFile) -> Result<Value, ModerationError> {
        let value = match file {
            DataFile::AdminIds => {
                let admin = self.admin.lock().await;
                serde_json::to_value(AdminRegion::snapshot(&admin.admin_ids))?
            }
            DataFile::TrustIds => {
                let admin = self.admin.lock().await;
                serde_json::to_value(AdminRegion::snapshot(&admin.trust_ids))?
            }
            DataFile::Words(word) => {
                let lexicons = self.regex.lock().await;
                serde_json::to_value(lexicons.get(&word).cloned().unwrap_or_default())?
            }
            other => self.snapshot_shared(other)?,
        };
        Ok(value)
    }

    fn snapshot_shared(&self, file: DataFile) -> Result<Value, ModerationError> {
        let value = match file {
            DataFile::BadIds => serde_json::to_value(IdSets {
                users: collect_set(&self.bad_users),
                channels: collect_set(&self.bad_channels),
            })?,
            DataFile::ExceptIds => serde_json::to_value(IdSets {
                users: collect_set(&self.except_users),
                channels: collect_set(&self.except_channels),
            })?,
            DataFile::Configs => {
                let map: BTreeMap<u64, GroupConfig> = self
                    .configs
                    .iter()
                    .map(|e| (*e.key(), e.value().clone()))
                    .collect();
                serde_json::to_value(map)?
            }
            DataFile::UserIds => {
                let map: BTreeMap<u64, UserRecord> = self
                    .user_ids
                    .iter()
                    .map(|e| (*e.key(), e.value().clone()))
                    .collect();
                serde_json::to_value(map)?
            }
            DataFile::WatchIds => serde_json::to_value(WatchTable {
                ban: self.watch_ban.iter().map(|e| (*e.key(), *e.value())).collect(),
                delete: self
                    .watch_delete
                    .iter()
                    .map(|e| (*e.key(), *e.value()))
                    .collect(),
            })?,
            DataFile::AdminIds | DataFile::TrustIds | DataFile::Words(_) => {
                return Err(ModerationError::StorageError(format!(
                    "{} is owned by a locked region",
                    file.name()
                )))
            }
        };
        Ok(value)
    }

    /// Persist `file`. Same locking rule as [`Self::snapshot`].
    pub async fn save(&self, file: DataFile) -> Result<(), ModerationError> {
        let value = self.snapshot(file).await?;
        self.store.save(file, &value).await
    }

    /// Persist admin and trust tables from an already-held admin region.
    pub async fn save_admin_tables(&self, admin: &AdminRegion) -> Result<(), ModerationError> {
        let admins = serde_json::to_value(AdminRegion::snapshot(&admin.admin_ids))?;
        self.store.save(DataFile::AdminIds, &admins).await?;
        let trusted = serde_json::to_value(AdminRegion::snapshot(&admin.trust_ids))?;
        self.store.save(DataFile::TrustIds, &trusted).await
    }

    /// Persist one lexicon from an already-held regex region.
    pub async fn save_words(&self, word: WordType, lexicon: &Lexicon) -> Result<(), ModerationError> {
        let value = serde_json::to_value(lexicon)?;
        self.store.save(DataFile::Words(word), &value).await
    }
}

/// Top-level emptiness: `null`, `[]` and `{}` count as empty.
pub fn is_empty_table(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::testing::MemoryTableStore;
    use serde_json::json;

    fn state_with(store: Arc<MemoryTableStore>) -> ModerationState {
        let settings = ModerationSettings {
            user_bot_id: 10,
            nospam_bot_id: 11,
            peer_bot_ids: vec![12, 0],
            ..Default::default()
        };
        ModerationState::new(settings, store)
    }

    #[tokio::test]
    async fn seeds_peer_bots_and_empty_lexicons() {
        let state = state_with(Arc::new(MemoryTableStore::new()));
        assert!(state.bot_ids.contains(&10));
        assert!(state.bot_ids.contains(&11));
        assert!(state.bot_ids.contains(&12));
        assert!(!state.bot_ids.contains(&0));
        assert_eq!(state.regex.lock().await.len(), WordType::ALL.len());
    }

    #[tokio::test]
    async fn ensure_group_creates_tables_once() {
        let state = state_with(Arc::new(MemoryTableStore::new()));
        let mut admin = state.admin.lock().await;

        assert!(state.ensure_group(&mut admin, 5));
        assert!(!state.ensure_group(&mut admin, 5));
        assert!(admin.trust_ids.contains_key(&5));
        drop(admin);

        assert_eq!(state.group_config(5).unwrap().limit, 1500);
        assert!(matches!(
            state.group_config(6),
            Err(ModerationError::MissingConfig(6))
        ));
    }

    #[tokio::test]
    async fn saved_tables_load_into_a_fresh_state() {
        let store = Arc::new(MemoryTableStore::new());
        let state = state_with(Arc::clone(&store));

        state.bad_users.insert(1);
        state.bad_channels.insert(2);
        state.watch(WatchKind::Ban).insert(3, 99);
        state.configs.insert(4, GroupConfig::with_limit(10));
        state.user_ids.entry(5).or_default().score.insert("long".into(), 0.6);
        {
            let mut admin = state.admin.lock().await;
            admin.admin_ids.insert(4, HashSet::from([7]));
            state.save_admin_tables(&admin).await.unwrap();
        }
        {
            let mut lexicons = state.regex.lock().await;
            let lexicon = lexicons.entry(WordType::Spam).or_default();
            *lexicon = Lexicon::from_patterns(["x"]);
            state.save_words(WordType::Spam, lexicon).await.unwrap();
        }
        for file in [
            DataFile::BadIds,
            DataFile::WatchIds,
            DataFile::Configs,
            DataFile::UserIds,
        ] {
            state.save(file).await.unwrap();
        }

        let reloaded = state_with(Arc::clone(&store));
        reloaded.load().await.unwrap();

        assert!(reloaded.bad_users.contains(&1));
        assert!(reloaded.bad_channels.contains(&2));
        assert_eq!(reloaded.watch(WatchKind::Ban).get(&3).map(|v| *v), Some(99));
        assert_eq!(reloaded.group_config(4).unwrap().limit, 10);
        assert!(reloaded.user_ids.contains_key(&5));
        assert!(reloaded.admin.lock().await.admin_ids[&4].contains(&7));
        assert_eq!(
            reloaded.regex.lock().await[&WordType::Spam].hits("x"),
            Some(0)
        );
    }

    #[tokio::test]
    async fn config_changes_are_persisted() {
        let store = Arc::new(MemoryTableStore::new());
        let state = state_with(Arc::clone(&store));

        let config = state.update_config(3, |c| c.limit = 200).await.unwrap();
        assert_eq!(config.limit, 200);
        assert!(!config.default);
        assert!(config.delete);
        assert_eq!(store.saved(DataFile::Configs).unwrap()["3"]["limit"], 200);

        let config = state.reset_config(3).await.unwrap();
        assert!(config.default);
        assert_eq!(state.group_config(3).unwrap().limit, 1500);
    }

    #[tokio::test]
    async fn bad_ids_snapshot_shape() {
        let state = state_with(Arc::new(MemoryTableStore::new()));
        state.bad_users.insert(2);
        state.bad_users.insert(1);

        let value = state.snapshot(DataFile::BadIds).await.unwrap();
        assert_eq!(value, json!({"users": [1, 2], "channels": []}));
    }

    #[test]
    fn empty_table_detection() {
        assert!(is_empty_table(&json!({})));
        assert!(is_empty_table(&json!([])));
        assert!(is_empty_table(&Value::Null));
        assert!(!is_empty_table(&json!({"users": [], "channels": []})));
    }
}
