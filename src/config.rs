use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

// Default configuration
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000";
pub const DEFAULT_ACTIVE_POLL_MS: u64 = 3_000;
pub const DEFAULT_SWEEP_MS: u64 = 10_000;
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;
pub const DEFAULT_TYPING_WINDOW_MS: u64 = 10_000;
pub const DEFAULT_SEND_REFETCH_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Polling intervals are never shorter than this.
pub const MIN_INTERVAL_MS: u64 = 100;

pub const ENV_RELAY_URL: &str = "POLLCORD_RELAY_URL";
pub const ENV_ACTIVE_POLL_MS: &str = "POLLCORD_ACTIVE_POLL_MS";
pub const ENV_SWEEP_MS: &str = "POLLCORD_SWEEP_MS";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the HTTP relay
    pub relay_url: String,
    pub active_poll_interval_ms: u64,
    pub sweep_interval_ms: u64,
    /// Messages fetched per active-channel poll
    pub message_limit: u32,
    pub typing_window_ms: u64,
    /// Delay before re-fetching after a successful send
    pub send_refetch_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Also sweep loaded guild channels, not just DMs
    pub sweep_guild_channels: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            active_poll_interval_ms: DEFAULT_ACTIVE_POLL_MS,
            sweep_interval_ms: DEFAULT_SWEEP_MS,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            typing_window_ms: DEFAULT_TYPING_WINDOW_MS,
            send_refetch_delay_ms: DEFAULT_SEND_REFETCH_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sweep_guild_channels: false,
        }
    }
}

/// Scheduler timing derived from [`Settings`].
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub active_interval: Duration,
    pub sweep_interval: Duration,
    pub message_limit: u32,
    pub typing_window: Duration,
    pub send_refetch_delay: Duration,
    pub sweep_guild_channels: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Settings::default().poll_config()
    }
}

impl Settings {
    pub fn poll_config(&self) -> PollConfig {
        let interval = |ms: u64| Duration::from_millis(ms.max(MIN_INTERVAL_MS));
        PollConfig {
            active_interval: interval(self.active_poll_interval_ms),
            sweep_interval: interval(self.sweep_interval_ms),
            message_limit: self.message_limit.max(1),
            typing_window: Duration::from_millis(self.typing_window_ms),
            send_refetch_delay: Duration::from_millis(self.send_refetch_delay_ms),
            sweep_guild_channels: self.sweep_guild_channels,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Apply environment overrides. Unparseable numbers are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RELAY_URL).filter(|u| !u.trim().is_empty()) {
            self.relay_url = url.trim().to_string();
        }
        if let Some(ms) = parse_env_ms(&lookup, ENV_ACTIVE_POLL_MS) {
            self.active_poll_interval_ms = ms;
        }
        if let Some(ms) = parse_env_ms(&lookup, ENV_SWEEP_MS) {
            self.sweep_interval_ms = ms;
        }
    }
}

fn parse_env_ms<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric override");
            None
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    if let Some(proj) = ProjectDirs::from("com", "pollcord", "pollcord-client") {
        let dir = proj.config_dir();
        if let Err(e) = fs::create_dir_all(dir) {
            tracing::warn!("Failed to create config dir: {}", e);
            return None;
        }
        return Some(dir.join("settings.json"));
    }
    None
}

pub fn load_settings() -> Option<Settings> {
    let path = settings_path()?;
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings file: {}", e);
            None
        }
    }
}

/// Settings file (or defaults) with environment overrides applied.
pub fn load_effective_settings() -> Settings {
    let mut settings = load_settings().unwrap_or_default();
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    settings
}
