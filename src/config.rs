use anyhow::Context;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

pub const DEFAULT_TEMPLATE: &str = "\
Now playing: {current_title}
by {current_artist}
Up next: {next_title} - {next_artist}
Then: {queue1_title} - {queue1_artist}
Later: {queue2_title} - {queue2_artist}
{reminder}";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub sync: SyncConfig,
    pub token: TokenConfig,
    pub spotify: SpotifyConfig,
    pub render: RenderConfig,
    pub target: TargetConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("config.toml"));
            candidates.push(current_dir.join("config").join("config.toml"));
            candidates.push(current_dir.join("config").join("nowplaying_sync.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("config.toml"));
                candidates.push(dir.join("config").join("config.toml"));
                candidates.push(dir.join("config").join("nowplaying_sync.toml"));
            }
        }

        for path in candidates {
            if path.exists() {
                let data = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                return Self::from_toml(&data)
                    .with_context(|| format!("Failed to parse config: {}", path.display()));
            }
        }

        Ok(Config::default())
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub tick_secs: f64,
    pub poll_interval_secs: f64,
    pub failure_tolerance: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_secs: 2.0,
            poll_interval_secs: 45.0,
            failure_tolerance: 3,
        }
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_secs.clamp(0.1, 60.0))
    }

    pub fn poll_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.poll_interval_secs.clamp(1.0, 3600.0) * 1000.0) as i64)
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub ttl_secs: u64,
    pub reauth_ratio: f64,
    pub warning_every_ticks: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            reauth_ratio: 0.86,
            warning_every_ticks: 10,
        }
    }
}

impl TokenConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.max(1) as i64)
    }

    pub fn reauth_ratio(&self) -> f64 {
        self.reauth_ratio.clamp(0.1, 1.0)
    }

    pub fn warning_every_ticks(&self) -> u32 {
        self.warning_every_ticks.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub process_name: String,
    pub paused_title: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            request_timeout_secs: 10,
            process_name: "Spotify.exe".to_string(),
            paused_title: "Spotify Premium".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub template: String,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub widths: FieldWidths,
    pub reminders: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            font_path: None,
            font_size: 14.0,
            widths: FieldWidths::default(),
            reminders: default_reminders(),
        }
    }
}

impl RenderConfig {
    pub fn font_size(&self) -> f32 {
        self.font_size.clamp(4.0, 96.0)
    }
}

/// Maximum rendered pixel width per template field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWidths {
    pub current: f32,
    pub next: f32,
    pub queued: f32,
}

impl Default for FieldWidths {
    fn default() -> Self {
        Self {
            current: 260.0,
            next: 180.0,
            queued: 140.0,
        }
    }
}

fn default_reminders() -> Vec<String> {
    [
        "Mirrored live from Spotify",
        "Queue refreshes every few seconds",
        "Requests welcome in chat",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub capture_countdown_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            capture_countdown_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub state_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("nowplaying_sync"))
            .context("No local data directory available; set [storage] state_dir")
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    token: TokenSection,
    #[serde(default)]
    spotify: SpotifySection,
    #[serde(default)]
    render: RenderSection,
    #[serde(default)]
    target: TargetSection,
    #[serde(default)]
    storage: StorageSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let sync_defaults = SyncConfig::default();
        let sync = SyncConfig {
            tick_secs: value.sync.tick_secs.unwrap_or(sync_defaults.tick_secs),
            poll_interval_secs: value
                .sync
                .poll_interval_secs
                .unwrap_or(sync_defaults.poll_interval_secs),
            failure_tolerance: value
                .sync
                .failure_tolerance
                .unwrap_or(sync_defaults.failure_tolerance),
        };

        let token_defaults = TokenConfig::default();
        let token = TokenConfig {
            ttl_secs: value.token.ttl_secs.unwrap_or(token_defaults.ttl_secs),
            reauth_ratio: value.token.reauth_ratio.unwrap_or(token_defaults.reauth_ratio),
            warning_every_ticks: value
                .token
                .warning_every_ticks
                .unwrap_or(token_defaults.warning_every_ticks),
        };

        let spotify_defaults = SpotifyConfig::default();
        let spotify = SpotifyConfig {
            api_base: value.spotify.api_base.unwrap_or(spotify_defaults.api_base),
            request_timeout_secs: value
                .spotify
                .request_timeout_secs
                .unwrap_or(spotify_defaults.request_timeout_secs),
            process_name: value
                .spotify
                .process_name
                .unwrap_or(spotify_defaults.process_name),
            paused_title: value
                .spotify
                .paused_title
                .unwrap_or(spotify_defaults.paused_title),
        };

        let width_defaults = FieldWidths::default();
        let render = RenderConfig {
            template: value.render.template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            font_path: value.render.font_path,
            font_size: value.render.font_size.unwrap_or(14.0),
            widths: FieldWidths {
                current: value.render.widths.current.unwrap_or(width_defaults.current),
                next: value.render.widths.next.unwrap_or(width_defaults.next),
                queued: value.render.widths.queued.unwrap_or(width_defaults.queued),
            },
            reminders: value
                .render
                .reminders
                .filter(|list| !list.is_empty())
                .unwrap_or_else(default_reminders),
        };

        let target = TargetConfig {
            capture_countdown_secs: value
                .target
                .capture_countdown_secs
                .unwrap_or(TargetConfig::default().capture_countdown_secs),
        };

        let storage = StorageConfig {
            state_dir: value.storage.state_dir,
        };

        Config {
            sync,
            token,
            spotify,
            render,
            target,
            storage,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SyncSection {
    tick_secs: Option<f64>,
    poll_interval_secs: Option<f64>,
    failure_tolerance: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenSection {
    ttl_secs: Option<u64>,
    reauth_ratio: Option<f64>,
    warning_every_ticks: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SpotifySection {
    api_base: Option<String>,
    request_timeout_secs: Option<u64>,
    process_name: Option<String>,
    paused_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSection {
    template: Option<String>,
    font_path: Option<PathBuf>,
    font_size: Option<f32>,
    #[serde(default)]
    widths: WidthsSection,
    reminders: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct WidthsSection {
    current: Option<f32>,
    next: Option<f32>,
    queued: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetSection {
    capture_countdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    state_dir: Option<PathBuf>,
}
