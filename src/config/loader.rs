use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Tick rates of the slow (arbitration) and fast (sync) loops
    pub polling: PollingConfig,

    /// Lyric line synchronization
    pub sync: SyncConfig,

    /// Lyrics providers, caching and matching
    pub lyrics: LyricsConfig,

    /// Now-playing sources, in arbitration order
    pub sources: SourcesConfig,

    /// Presentation output
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    /// Source arbitration interval (ms)
    pub slow_tick_ms: u64,

    /// Position estimation / lyric sync interval (ms)
    pub fast_tick_ms: u64,

    /// Consecutive empty polls before the displayed track is cleared
    pub clear_after_missed_polls: u32,

    /// How often demoted sources are probed again (ms)
    pub reinit_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            slow_tick_ms: 2000,
            fast_tick_ms: 100,
            clear_after_missed_polls: 15,
            reinit_interval_ms: 30_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Forward bias applied when picking the active line (ms)
    pub look_ahead_ms: u64,

    /// Provisional length of the last lyric line until the duration is known (ms)
    pub last_line_window_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            look_ahead_ms: 150,
            last_line_window_ms: 5000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LyricsConfig {
    /// Whether providers persist fetched documents on disk
    pub cache_enabled: bool,

    /// Root of the persistent cache, one subdirectory per provider
    pub cache_dir: Option<String>,

    /// Directory scanned by the `local` provider
    pub local_dir: String,

    /// Genius API client access token; `GENIUS_API_KEY` is used when unset
    pub genius_token: Option<String>,

    /// Providers in registration order
    pub providers: Vec<ProviderEntry>,

    pub matching: MatchingConfig,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        let pkg_name = env!("CARGO_PKG_NAME");
        let default_lyrics_path = dirs::config_dir()
            .map(|p| p.join(pkg_name).join("lyrics"))
            .unwrap_or_else(|| PathBuf::from("lyrics"));

        Self {
            cache_enabled: true,
            cache_dir: None,
            local_dir: default_lyrics_path.to_string_lossy().to_string(),
            genius_token: None,
            providers: vec![
                ProviderEntry::new("local", 0),
                ProviderEntry::new("lrclib", 1),
                ProviderEntry::new("netease", 2),
                ProviderEntry::new("genius", 3),
            ],
            matching: MatchingConfig::default(),
        }
    }
}

impl LyricsConfig {
    pub fn genius_token(&self) -> Option<String> {
        self.genius_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env::var("GENIUS_API_KEY").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Cache root with `~/` expanded, falling back to the user cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => expand_home(dir),
            None => {
                let pkg_name = env!("CARGO_PKG_NAME");
                dirs::cache_dir()
                    .map(|p| p.join(pkg_name).join("lyrics"))
                    .unwrap_or_else(|| PathBuf::from(format!("{}-cache", pkg_name)))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderEntry {
    pub name: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Lower is tried first; unset means the large default priority
    #[serde(default)]
    pub priority: Option<u32>,
}

impl ProviderEntry {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            priority: Some(priority),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Fuzzy matching knobs for search based providers.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub accept_threshold: f64,
    pub title_weight: f64,
    pub artist_weight: f64,
    pub local_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.3,
            title_weight: 0.7,
            artist_weight: 0.3,
            local_threshold: 0.6,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub spotify: SpotifyConfig,
    pub mpris: MprisConfig,
    pub window_title: WindowTitleConfig,
    pub process_presence: ProcessPresenceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub enabled: bool,

    /// OAuth bearer token; `SPOTIFY_ACCESS_TOKEN` is used when unset
    pub access_token: Option<String>,

    pub api_base: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access_token: None,
            api_base: "https://api.spotify.com".to_string(),
        }
    }
}

impl SpotifyConfig {
    pub fn resolved_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env::var("SPOTIFY_ACCESS_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MprisConfig {
    pub enabled: bool,

    /// Players whose bus name or identity contains one of these keywords are ignored
    pub player_blacklist: Vec<String>,
}

impl Default for MprisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player_blacklist: ["kdeconnect"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WindowTitleConfig {
    pub enabled: bool,

    /// Command printing one window per line in `wmctrl -lx` format
    pub lister_command: Vec<String>,

    /// Duration reported for window-title tracks. Window titles carry no
    /// duration, so any value here is a guess.
    pub fallback_duration_ms: Option<u64>,

    /// Tried in order, first match wins
    pub patterns: Vec<TitlePatternConfig>,
}

impl Default for WindowTitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lister_command: vec!["wmctrl".to_string(), "-lx".to_string()],
            fallback_duration_ms: None,
            patterns: default_title_patterns(),
        }
    }
}

/// One window-title rule. `pattern` must define a `title` and/or `artist` named group.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TitlePatternConfig {
    pub player: String,
    pub pattern: String,

    /// Window class keywords the rule is restricted to; empty matches every window
    #[serde(default)]
    pub processes: Vec<String>,

    #[serde(default)]
    pub default_artist: Option<String>,

    #[serde(default)]
    pub min_title_chars: usize,
}

fn default_title_patterns() -> Vec<TitlePatternConfig> {
    let browsers: Vec<String> = ["firefox", "chrom", "brave", "edge", "vivaldi", "opera"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    vec![
        TitlePatternConfig {
            player: "YouTube Music".to_string(),
            pattern: r"^(?P<title>.+?) - (?P<artist>.+?) - YouTube Music".to_string(),
            processes: browsers.clone(),
            default_artist: None,
            min_title_chars: 0,
        },
        TitlePatternConfig {
            player: "YouTube".to_string(),
            pattern: r"^(?P<title>.+?) - YouTube(?:\s|$)".to_string(),
            processes: browsers.clone(),
            default_artist: Some("YouTube".to_string()),
            min_title_chars: 4,
        },
        TitlePatternConfig {
            player: "Spotify".to_string(),
            pattern: r"^(?P<artist>.+?) - (?P<title>.+?)(?: - Spotify)?$".to_string(),
            processes: vec!["spotify".to_string()],
            default_artist: None,
            min_title_chars: 0,
        },
        TitlePatternConfig {
            player: "Spotify Web".to_string(),
            pattern: r"^(?P<artist>.+?) - (?P<title>.+?) \| Spotify".to_string(),
            processes: browsers,
            default_artist: None,
            min_title_chars: 0,
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessPresenceConfig {
    pub enabled: bool,
    pub players: Vec<PresencePlayer>,
}

impl Default for ProcessPresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            players: vec![
                PresencePlayer::new("spotify", "Spotify"),
                PresencePlayer::new("rhythmbox", "Rhythmbox"),
                PresencePlayer::new("vlc", "VLC"),
            ],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PresencePlayer {
    /// Process name as listed in `/proc/<pid>/comm`
    pub process: String,
    pub display_name: String,
}

impl PresencePlayer {
    pub fn new(process: &str, display_name: &str) -> Self {
        Self {
            process: process.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Print the active lyric line whenever it changes
    #[default]
    Lines,
    /// Print the unified playback state as one JSON object per change
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub output: OutputMode,

    /// Print an `artist - title` header on track change (lines mode)
    pub show_header: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output: OutputMode::Lines,
            show_header: true,
        }
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        let pkg_name = env!("CARGO_PKG_NAME");
        dirs::config_dir()
            .map(|p| p.join(pkg_name).join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(format!("{}-config.toml", pkg_name)))
    }

    /// Loads from `path` or the default location, writing a default file when none exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        debug!("Loading configuration from {:?}", config_path);

        if !config_path.exists() {
            debug!("{:?} does not exist, writing defaults", config_path);
            let default_config = Config::default();
            default_config.write_to(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = match toml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to parse {:?}: {}", config_path, e);
                warn!("Falling back to the default configuration");
                Config::default()
            }
        };

        debug!("Configuration loaded");
        Ok(config)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
