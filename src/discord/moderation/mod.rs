// Discord side of long-message moderation.

pub mod inbound;
pub mod long_handler;
