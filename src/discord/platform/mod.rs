// Serenity implementations of the core's platform ports.

pub mod directory;
pub mod peers;

pub use directory::SerenityDirectory;
pub use peers::DiscordPeerChannel;
