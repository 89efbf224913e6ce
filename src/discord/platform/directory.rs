// Guild queries for the maintenance jobs.
//
// A guild's "admin roster" is its owner plus every member holding at least
// one moderation permission through their roles.

use crate::core::moderation::{AdminMember, GroupDirectory, ModerationError};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::Permissions;
use std::sync::Arc;

/// Page size for the member listing endpoint.
const MEMBER_PAGE: u64 = 1000;

fn staff_permissions() -> Permissions {
    Permissions::ADMINISTRATOR
        | Permissions::MANAGE_GUILD
        | Permissions::MANAGE_MESSAGES
        | Permissions::MODERATE_MEMBERS
        | Permissions::BAN_MEMBERS
        | Permissions::KICK_MEMBERS
}

/// Roster entry for a member, or `None` if they are not staff.
pub fn roster_entry(user_id: u64, is_owner: bool, permissions: Permissions) -> Option<AdminMember> {
    if !is_owner && !permissions.intersects(staff_permissions()) {
        return None;
    }

    let administrator = permissions.contains(Permissions::ADMINISTRATOR);
    Some(AdminMember {
        user_id,
        is_creator: is_owner,
        can_delete_messages: administrator
            || permissions.contains(Permissions::MANAGE_MESSAGES),
        can_restrict_members: administrator
            || permissions
                .intersects(Permissions::MODERATE_MEMBERS | Permissions::BAN_MEMBERS),
    })
}

fn guild_id(group_id: u64) -> Option<serenity::GuildId> {
    (group_id != 0).then(|| serenity::GuildId::new(group_id))
}

pub struct SerenityDirectory {
    http: Arc<serenity::Http>,
}

impl SerenityDirectory {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    async fn all_members(
        &self,
        guild: serenity::GuildId,
    ) -> serenity::Result<Vec<serenity::Member>> {
        let mut members = Vec::new();
        let mut after: Option<serenity::UserId> = None;
        loop {
            let page = guild.members(&self.http, Some(MEMBER_PAGE), after).await?;
            let done = (page.len() as u64) < MEMBER_PAGE;
            after = page.last().map(|m| m.user.id);
            members.extend(page);
            if done || after.is_none() {
                return Ok(members);
            }
        }
    }
}

#[async_trait]
impl GroupDirectory for SerenityDirectory {
    async fn admins(&self, group_id: u64) -> Option<Vec<AdminMember>> {
        let guild_id = guild_id(group_id)?;
        let guild = match guild_id.to_partial_guild(&self.http).await {
            Ok(guild) => guild,
            Err(e) => {
                tracing::debug!(group_id, "Failed to fetch guild: {}", e);
                return None;
            }
        };
        let members = match self.all_members(guild_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::debug!(group_id, "Failed to list members: {}", e);
                return None;
            }
        };

        // The @everyone role shares the guild's id.
        let everyone = guild
            .roles
            .get(&serenity::RoleId::new(group_id))
            .map(|r| r.permissions)
            .unwrap_or_else(Permissions::empty);

        let roster = members
            .iter()
            .filter_map(|member| {
                let permissions = member
                    .roles
                    .iter()
                    .filter_map(|id| guild.roles.get(id))
                    .fold(everyone, |acc, role| acc | role.permissions);
                roster_entry(
                    member.user.id.get(),
                    member.user.id == guild.owner_id,
                    permissions,
                )
            })
            .collect();
        Some(roster)
    }

    async fn is_member(&self, group_id: u64, user_id: u64) -> bool {
        let Some(guild_id) = guild_id(group_id) else {
            return false;
        };
        if user_id == 0 {
            return false;
        }
        guild_id
            .member(&self.http, serenity::UserId::new(user_id))
            .await
            .is_ok()
    }

    async fn group_info(&self, group_id: u64) -> (String, String) {
        let fallback = (group_id.to_string(), String::new());
        let Some(guild_id) = guild_id(group_id) else {
            return fallback;
        };
        match guild_id.to_partial_guild(&self.http).await {
            Ok(guild) => {
                let link = guild
                    .vanity_url_code
                    .map(|code| format!("https://discord.gg/{}", code))
                    .unwrap_or_default();
                (guild.name, link)
            }
            Err(_) => fallback,
        }
    }

    async fn leave(&self, group_id: u64) -> Result<(), ModerationError> {
        let guild_id = guild_id(group_id)
            .ok_or_else(|| ModerationError::PlatformError("Invalid guild id 0".to_string()))?;
        guild_id
            .leave(&self.http)
            .await
            .map_err(|e| ModerationError::PlatformError(e.to_string()))
    }
}
