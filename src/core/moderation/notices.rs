// Text for debug-channel notices.
//
// Plain markdown so any adapter can post it as-is.

pub fn code(text: impl std::fmt::Display) -> String {
    format!("`{}`", text)
}

pub fn general_link(name: &str, link: &str) -> String {
    if link.is_empty() {
        name.to_string()
    } else {
        format!("[{}]({})", name, link)
    }
}

fn line(label: &str, value: &str) -> String {
    format!("{}: {}\n", label, value)
}

/// Posted after the monthly reset.
pub fn reset_notice(project: &str) -> String {
    let mut text = line("Project", &code(project));
    text.push_str(&line("Action", &code("Reset data")));
    text
}

/// Why the bot asks to leave a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// The peer user bot is not an admin
    User,
    /// We lack delete/restrict permissions
    Permissions,
}

impl LeaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::User => "user",
            LeaveReason::Permissions => "permissions",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            LeaveReason::User => "Missing the USER bot as an admin",
            LeaveReason::Permissions => "Missing delete or restrict permissions",
        }
    }
}

/// Posted when a leave request goes to MANAGE.
pub fn leave_request_notice(
    project: &str,
    group_id: u64,
    group_name: &str,
    group_link: &str,
    reason: LeaveReason,
) -> String {
    let mut text = line("Project", &code(project));
    text.push_str(&line("Group Name", &general_link(group_name, group_link)));
    text.push_str(&line("Group ID", &code(group_id)));
    text.push_str(&line("Status", &code(reason.describe())));
    text
}

/// Posted after leaving a group we are no longer part of.
pub fn auto_leave_notice(project: &str, group_id: u64, group_name: &str, group_link: &str) -> String {
    let mut text = line("Project", &code(project));
    text.push_str(&line("Group Name", &general_link(group_name, group_link)));
    text.push_str(&line("Group ID", &code(group_id)));
    text.push_str(&line("Status", &code("Left automatically")));
    text.push_str(&line("Reason", &code("Bot is no longer an admin")));
    text
}
