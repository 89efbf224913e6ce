// Periodic maintenance jobs.
//
// Each job logs its own failure and reports a plain success flag, so the
// scheduler loops in main never have to deal with errors.

use crate::core::exchange::ExchangeMessage;
use crate::core::moderation::notices::{self, LeaveReason};
use crate::core::moderation::state::{is_empty_table, AdminRegion};
use crate::core::moderation::{
    DataFile, GroupDirectory, ModerationError, ModerationState, PeerChannel, WatchKind,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct MaintenanceService {
    state: Arc<ModerationState>,
    directory: Arc<dyn GroupDirectory>,
    peers: Arc<dyn PeerChannel>,
    /// Pause between two backup uploads
    backup_delay: Duration,
}

/// Log a job failure and turn the result into a success flag.
fn report(job: &str, result: Result<(), ModerationError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{} error: {}", job, e);
            false
        }
    }
}

impl MaintenanceService {
    pub fn new(
        state: Arc<ModerationState>,
        directory: Arc<dyn GroupDirectory>,
        peers: Arc<dyn PeerChannel>,
        backup_delay: Duration,
    ) -> Self {
        Self {
            state,
            directory,
            peers,
            backup_delay,
        }
    }

    fn project(&self) -> &str {
        &self.state.settings.project_name
    }

    /// Forget who was reported, and which messages were declared, in the
    /// current window.
    pub async fn interval_min_10(&self) -> bool {
        let mut region = self.state.message.lock().await;
        for ids in region.recorded_ids.values_mut() {
            ids.clear();
        }
        region.declared_message_ids.clear();
        tracing::debug!(groups = region.recorded_ids.len(), "Cleared recorded users");
        true
    }

    /// Monthly wipe of user-level data.
    ///
    /// Everything is cleared in memory first, so a failing save only leaves
    /// the stored copy behind.
    pub async fn reset_data(&self) -> bool {
        let state = &self.state;
        state.bad_users.clear();
        state.user_ids.clear();
        for kind in WatchKind::ALL {
            state.watch(kind).clear();
        }

        let mut ok = true;
        for file in [DataFile::BadIds, DataFile::UserIds, DataFile::WatchIds] {
            ok &= report("Reset data save", state.save(file).await);
        }

        tracing::info!("Monthly data reset done");
        ok &= report(
            "Reset data notice",
            self.peers
                .send_debug(notices::reset_notice(self.project()))
                .await,
        );
        ok
    }

    /// Report lexicon hit counts to the REGEX bot, then start counting again.
    ///
    /// A lexicon whose report did not go out keeps its counts for next time.
    pub async fn send_count(&self) -> bool {
        let mut lexicons = self.state.regex.lock().await;
        let mut words: Vec<_> = lexicons.keys().copied().collect();
        words.sort();

        let mut ok = true;
        for word in words {
            let Some(lexicon) = lexicons.get_mut(&word) else {
                continue;
            };

            let counts: serde_json::Map<String, serde_json::Value> = lexicon
                .counts()
                .into_iter()
                .map(|(pattern, hits)| (pattern, json!(hits)))
                .collect();
            let shared = self
                .peers
                .share(ExchangeMessage::new(
                    self.project(),
                    &["REGEX"],
                    "regex",
                    "count",
                    json!({ "type": word.as_str(), "counts": counts }),
                ))
                .await;
            if !report("Send count", shared) {
                ok = false;
                continue;
            }

            lexicon.reset_counts();
            ok &= report("Send count save", self.state.save_words(word, lexicon).await);
        }

        ok
    }

    /// Daily refresh of every group's admin and trust sets.
    ///
    /// Groups where we can no longer work ask MANAGE to let us leave. Groups
    /// we are no longer part of are left right away. A failure in one group
    /// is logged and the refresh moves on to the next.
    pub async fn update_admins(&self) -> bool {
        let mut admin = self.state.admin.lock().await;
        let mut groups: Vec<u64> = admin.admin_ids.keys().copied().collect();
        groups.sort_unstable();

        let mut ok = true;
        for gid in groups {
            if let Err(e) = self.refresh_group(&mut admin, gid).await {
                tracing::warn!(group_id = gid, "Update admin error: {}", e);
                ok = false;
            }
        }
        ok
    }

    async fn refresh_group(&self, admin: &mut AdminRegion, gid: u64) -> Result<(), ModerationError> {
        let settings = &self.state.settings;
        let roster = self.directory.admins(gid).await;
        let own = roster
            .as_ref()
            .and_then(|r| r.iter().find(|m| m.user_id == settings.bot_id).cloned());

        let (Some(roster), Some(own)) = (roster, own) else {
            admin.admin_ids.remove(&gid);
            admin.trust_ids.remove(&gid);
            self.state.configs.remove(&gid);
            let left = self.auto_leave(gid).await;
            let saved = self.state.save_admin_tables(admin).await;
            let configs = self.state.save(DataFile::Configs).await;
            return left.and(saved).and(configs);
        };

        let mut admins: HashSet<u64> = roster
            .iter()
            .filter(|m| m.is_effective_admin())
            .map(|m| m.user_id)
            .collect();
        let trusted: HashSet<u64> = roster.iter().map(|m| m.user_id).collect();

        if settings.nospam_bot_id != 0
            && self.directory.is_member(gid, settings.nospam_bot_id).await
        {
            admins.insert(settings.nospam_bot_id);
        }

        let reason = if !admins.contains(&settings.user_bot_id) {
            Some(LeaveReason::User)
        } else if !(own.can_delete_messages && own.can_restrict_members) {
            Some(LeaveReason::Permissions)
        } else {
            None
        };

        admin.admin_ids.insert(gid, admins);
        admin.trust_ids.insert(gid, trusted);
        let saved = self.state.save_admin_tables(admin).await;

        match reason {
            Some(reason) => saved.and(self.request_leave(gid, reason).await),
            None => saved,
        }
    }

    async fn request_leave(&self, gid: u64, reason: LeaveReason) -> Result<(), ModerationError> {
        let (name, link) = self.directory.group_info(gid).await;
        tracing::info!(group_id = gid, reason = reason.as_str(), "Requesting to leave group");

        self.peers
            .share(ExchangeMessage::new(
                self.project(),
                &["MANAGE"],
                "leave",
                "request",
                json!({
                    "group_id": gid,
                    "group_name": name,
                    "group_link": link,
                    "reason": reason.as_str(),
                }),
            ))
            .await?;
        self.peers
            .send_debug(notices::leave_request_notice(
                self.project(),
                gid,
                &name,
                &link,
                reason,
            ))
            .await
    }

    /// Leave a group whose roster we can no longer read.
    ///
    /// The platform usually refuses the leave because we are already out, so
    /// a failed leave still counts as gone.
    async fn auto_leave(&self, gid: u64) -> Result<(), ModerationError> {
        let (name, link) = self.directory.group_info(gid).await;
        tracing::info!(group_id = gid, "Bot is gone from group, leaving");

        if let Err(e) = self.directory.leave(gid).await {
            tracing::warn!(group_id = gid, "Leave group error, treating as left: {}", e);
        }
        self.peers
            .share(ExchangeMessage::new(
                self.project(),
                &["MANAGE"],
                "leave",
                "info",
                json!({
                    "group_id": gid,
                    "group_name": name,
                    "group_link": link,
                }),
            ))
            .await?;
        self.peers
            .send_debug(notices::auto_leave_notice(self.project(), gid, &name, &link))
            .await
    }

    /// Upload every non-empty table to the BACKUP bot.
    pub async fn backup_files(&self) -> bool {
        report("Backup", self.try_backup_files().await)
    }

    async fn try_backup_files(&self) -> Result<(), ModerationError> {
        for file in DataFile::all() {
            let value = self.state.snapshot(file).await?;
            if is_empty_table(&value) {
                continue;
            }

            let bytes = serde_json::to_vec_pretty(&value)?;
            let name = file.name();
            self.peers
                .share(
                    ExchangeMessage::new(self.project(), &["BACKUP"], "backup", "data", json!(name))
                        .with_attachment(format!("{}.json", name), bytes),
                )
                .await?;
            tracing::debug!(table = %name, "Backed up table");

            tokio::time::sleep(self.backup_delay).await;
        }

        Ok(())
    }

    /// Tell the BACKUP bot how we are doing (`awake` at startup).
    pub async fn update_status(&self, kind: &str) -> bool {
        let message = ExchangeMessage::new(
            self.project(),
            &["BACKUP"],
            "backup",
            "status",
            json!({ "type": kind, "backup": self.state.settings.backup }),
        );
        report("Update status", self.peers.share(message).await)
    }
}
