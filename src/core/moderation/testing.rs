// In-memory ports for core tests.

use super::moderation_models::{AdminMember, DataFile, ModerationSettings};
use super::moderation_ports::{GroupDirectory, ModerationError, PeerChannel, TableStore};
use super::state::ModerationState;
use crate::core::exchange::ExchangeMessage;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const BOT_ID: u64 = 1000;
pub const USER_BOT_ID: u64 = 1001;
pub const NOSPAM_BOT_ID: u64 = 1002;
pub const EXCHANGE_CHANNEL: u64 = 2000;
pub const HIDE_CHANNEL: u64 = 2001;
pub const TEST_GROUP: u64 = 2002;

pub fn test_settings() -> ModerationSettings {
    ModerationSettings {
        bot_id: BOT_ID,
        user_bot_id: USER_BOT_ID,
        nospam_bot_id: NOSPAM_BOT_ID,
        exchange_channel_id: EXCHANGE_CHANNEL,
        hide_channel_id: HIDE_CHANNEL,
        test_group_id: TEST_GROUP,
        ..Default::default()
    }
}

pub fn test_state() -> (Arc<ModerationState>, Arc<MemoryTableStore>) {
    state_with_store(MemoryTableStore::new())
}

pub fn state_with_store(store: MemoryTableStore) -> (Arc<ModerationState>, Arc<MemoryTableStore>) {
    let store = Arc::new(store);
    let state = Arc::new(ModerationState::new(test_settings(), store.clone()));
    (state, store)
}

/// Keeps saved tables in a map and counts saves per table.
#[derive(Default)]
pub struct MemoryTableStore {
    tables: DashMap<String, Value>,
    saves: DashMap<String, usize>,
    failing: AtomicBool,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose saves all fail.
    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn saved(&self, file: DataFile) -> Option<Value> {
        self.tables.get(&file.name()).map(|v| v.clone())
    }

    pub fn save_count(&self, file: DataFile) -> usize {
        self.saves.get(&file.name()).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn save(&self, file: DataFile, value: &Value) -> Result<(), ModerationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ModerationError::StorageError(format!("disk full: {}", file.name())));
        }
        self.tables.insert(file.name(), value.clone());
        *self.saves.entry(file.name()).or_insert(0) += 1;
        Ok(())
    }

    async fn load(&self, file: DataFile) -> Result<Option<Value>, ModerationError> {
        Ok(self.tables.get(&file.name()).map(|v| v.clone()))
    }
}

/// Scripted admin rosters.
#[derive(Default)]
pub struct MockDirectory {
    pub rosters: DashMap<u64, Vec<AdminMember>>,
    /// (group, user) pairs that count as members
    pub members: DashSet<(u64, u64)>,
    pub left: DashSet<u64>,
    /// Groups whose leave call fails
    pub stuck: DashSet<u64>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupDirectory for MockDirectory {
    async fn admins(&self, group_id: u64) -> Option<Vec<AdminMember>> {
        self.rosters.get(&group_id).map(|r| r.clone())
    }

    async fn is_member(&self, group_id: u64, user_id: u64) -> bool {
        self.members.contains(&(group_id, user_id))
    }

    async fn group_info(&self, group_id: u64) -> (String, String) {
        (
            format!("Group {}", group_id),
            format!("https://example.invalid/{}", group_id),
        )
    }

    async fn leave(&self, group_id: u64) -> Result<(), ModerationError> {
        if self.stuck.contains(&group_id) {
            return Err(ModerationError::PlatformError("Unknown Guild".to_string()));
        }
        self.left.insert(group_id);
        Ok(())
    }
}

/// Records everything that would have gone out.
#[derive(Default)]
pub struct MockPeers {
    pub shared: Mutex<Vec<ExchangeMessage>>,
    pub debug: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers that reject every share. Debug notices still go out.
    pub fn offline() -> Self {
        let peers = Self::default();
        peers.offline.store(true, Ordering::SeqCst);
        peers
    }

    pub fn shared(&self) -> Vec<ExchangeMessage> {
        self.shared.lock().unwrap().clone()
    }

    pub fn debug(&self) -> Vec<String> {
        self.debug.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerChannel for MockPeers {
    async fn share(&self, message: ExchangeMessage) -> Result<(), ModerationError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ModerationError::PlatformError("Missing Access".to_string()));
        }
        self.shared.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_debug(&self, text: String) -> Result<(), ModerationError> {
        self.debug.lock().unwrap().push(text);
        Ok(())
    }
}

pub fn admin(user_id: u64) -> AdminMember {
    AdminMember {
        user_id,
        is_creator: false,
        can_delete_messages: true,
        can_restrict_members: true,
    }
}

pub fn helper(user_id: u64) -> AdminMember {
    AdminMember {
        user_id,
        is_creator: false,
        can_delete_messages: true,
        can_restrict_members: false,
    }
}
