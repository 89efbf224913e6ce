// Discord commands module.
// Each feature gets its own command file.

pub mod long_config;

// Bot presence management
pub mod presence;
