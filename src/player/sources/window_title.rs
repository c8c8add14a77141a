use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{TitlePatternConfig, WindowTitleConfig};
use crate::error::SourceError;
use crate::player::{Capabilities, TrackSnapshot, TrackSnapshotSource};

/// One top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// WM_CLASS, e.g. `spotify.Spotify` or `Navigator.firefox`
    pub class: String,
    pub title: String,
}

impl WindowInfo {
    pub fn new(class: &str, title: &str) -> Self {
        Self {
            class: class.to_string(),
            title: title.to_string(),
        }
    }
}

/// Enumerates windows. The platform mechanics live behind this trait.
pub trait WindowLister: Send {
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>, SourceError>;
}

/// Runs a command producing `wmctrl -lx` output.
pub struct WmctrlLister {
    command: Vec<String>,
}

impl WmctrlLister {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

fn wmctrl_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\S+\s+-?\d+\s+(?P<class>\S+)\s+\S+\s*(?P<title>.*)$")
            .expect("valid wmctrl pattern")
    })
}

/// Parses `wmctrl -lx` output: `<id> <desktop> <class> <host> <title>`.
pub fn parse_wmctrl_output(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| wmctrl_line().captures(line))
        .map(|caps| WindowInfo::new(&caps["class"], caps["title"].trim()))
        .filter(|w| !w.title.is_empty())
        .collect()
}

impl WindowLister for WmctrlLister {
    fn list_windows(&mut self) -> Result<Vec<WindowInfo>, SourceError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(SourceError::Unavailable("empty window lister command".to_string()));
        };

        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            return Err(SourceError::Transient(format!(
                "{} exited with {}",
                program, output.status
            )));
        }
        Ok(parse_wmctrl_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// A compiled window-title rule.
#[derive(Debug)]
pub struct TitlePattern {
    player: String,
    regex: Regex,
    processes: Vec<String>,
    default_artist: Option<String>,
    min_title_chars: usize,
}

impl TitlePattern {
    pub fn compile(config: &TitlePatternConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            player: config.player.clone(),
            regex: Regex::new(&config.pattern)?,
            processes: config.processes.iter().map(|p| p.to_lowercase()).collect(),
            default_artist: config.default_artist.clone(),
            min_title_chars: config.min_title_chars,
        })
    }

    /// `(title, artist)` when the window satisfies this rule.
    pub fn matches(&self, window: &WindowInfo) -> Option<(String, String)> {
        if !self.processes.is_empty() {
            let class = window.class.to_lowercase();
            if !self.processes.iter().any(|p| class.contains(p.as_str())) {
                return None;
            }
        }

        let caps = self.regex.captures(&window.title)?;
        let title = caps
            .name("title")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let artist = caps
            .name("artist")
            .map(|m| m.as_str().trim().to_string())
            .filter(|a| !a.is_empty())
            .or_else(|| self.default_artist.clone())
            .unwrap_or_default();

        if title.chars().count() < self.min_title_chars {
            return None;
        }
        if title.is_empty() && artist.is_empty() {
            return None;
        }
        Some((title, artist))
    }
}

/// Scrapes "artist - title" out of player and browser window titles.
///
/// Window titles carry no position, so snapshots always report 0 and the
/// session keeps estimating from the first sighting.
pub struct WindowTitleSource {
    lister: Box<dyn WindowLister>,
    patterns: Vec<TitlePattern>,
    fallback_duration_ms: Option<u64>,
}

impl WindowTitleSource {
    pub fn new(lister: Box<dyn WindowLister>, patterns: Vec<TitlePattern>) -> Self {
        Self {
            lister,
            patterns,
            fallback_duration_ms: None,
        }
    }

    /// Builds the source from config, skipping rules that fail to compile.
    pub fn from_config(config: &WindowTitleConfig) -> Self {
        let patterns = config
            .patterns
            .iter()
            .filter_map(|p| match TitlePattern::compile(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring window title pattern for {}: {}", p.player, e);
                    None
                }
            })
            .collect();

        Self::new(
            Box::new(WmctrlLister::new(config.lister_command.clone())),
            patterns,
        )
        .with_fallback_duration(config.fallback_duration_ms)
    }

    pub fn with_fallback_duration(mut self, duration_ms: Option<u64>) -> Self {
        self.fallback_duration_ms = duration_ms;
        self
    }
}

impl TrackSnapshotSource for WindowTitleSource {
    fn name(&self) -> &str {
        "window_title"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        if self.patterns.is_empty() {
            return Err(SourceError::Unavailable("no title patterns".to_string()));
        }
        self.lister
            .list_windows()
            .map(|_| ())
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        let windows = self.lister.list_windows()?;

        for pattern in &self.patterns {
            for window in &windows {
                if let Some((title, artist)) = pattern.matches(window) {
                    debug!("Window {:?} matched {}", window.title, pattern.player);
                    return Ok(Some(TrackSnapshot {
                        title,
                        artist,
                        duration_ms: self.fallback_duration_ms.unwrap_or(0),
                        is_playing: true,
                        source_name: pattern.player.clone(),
                        ..Default::default()
                    }));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowTitleConfig;

    struct StaticLister(Vec<WindowInfo>);

    impl WindowLister for StaticLister {
        fn list_windows(&mut self) -> Result<Vec<WindowInfo>, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn source_with(windows: Vec<WindowInfo>) -> WindowTitleSource {
        let patterns = WindowTitleConfig::default()
            .patterns
            .iter()
            .map(|p| TitlePattern::compile(p).unwrap())
            .collect();
        WindowTitleSource::new(Box::new(StaticLister(windows)), patterns)
    }

    #[test]
    fn test_parse_wmctrl_output() {
        let output = "0x03a00003  0 spotify.Spotify       host Daft Punk - One More Time\n\
                      0x04000007 -1 xfce4-panel.Xfce4-panel  host \n\
                      0x05200003  1 Navigator.firefox     host Song - Band - YouTube Music — Mozilla Firefox\n";
        let windows = parse_wmctrl_output(output);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], WindowInfo::new("spotify.Spotify", "Daft Punk - One More Time"));
        assert_eq!(windows[1].class, "Navigator.firefox");
    }

    #[test]
    fn test_spotify_desktop_title() {
        let mut source = source_with(vec![WindowInfo::new(
            "spotify.Spotify",
            "Daft Punk - One More Time",
        )]);
        let s = source.poll().unwrap().unwrap();
        assert_eq!(s.artist, "Daft Punk");
        assert_eq!(s.title, "One More Time");
        assert_eq!(s.source_name, "Spotify");
        assert!(s.is_playing);
        assert_eq!(s.duration_ms, 0);
    }

    #[test]
    fn test_youtube_music_beats_youtube() {
        let mut source = source_with(vec![WindowInfo::new(
            "Navigator.firefox",
            "Around the World - Daft Punk - YouTube Music — Mozilla Firefox",
        )]);
        let s = source.poll().unwrap().unwrap();
        assert_eq!(s.title, "Around the World");
        assert_eq!(s.artist, "Daft Punk");
        assert_eq!(s.source_name, "YouTube Music");
    }

    #[test]
    fn test_youtube_uses_default_artist_and_min_length() {
        let mut source = source_with(vec![WindowInfo::new(
            "Navigator.firefox",
            "Some Video - YouTube — Mozilla Firefox",
        )]);
        let s = source.poll().unwrap().unwrap();
        assert_eq!(s.title, "Some Video");
        assert_eq!(s.artist, "YouTube");

        let mut short = source_with(vec![WindowInfo::new("Navigator.firefox", "abc - YouTube")]);
        assert!(short.poll().unwrap().is_none());
    }

    #[test]
    fn test_spotify_web_title() {
        let mut source = source_with(vec![WindowInfo::new(
            "google-chrome.Google-chrome",
            "Artist X - Song A | Spotify - Google Chrome",
        )]);
        let s = source.poll().unwrap().unwrap();
        assert_eq!(s.artist, "Artist X");
        assert_eq!(s.title, "Song A");
        assert_eq!(s.source_name, "Spotify Web");
    }

    #[test]
    fn test_process_filter_and_no_match() {
        // a terminal whose title looks like "a - b" is not Spotify
        let mut source = source_with(vec![WindowInfo::new("kitty.kitty", "vim - notes.txt")]);
        assert!(source.poll().unwrap().is_none());
    }

    #[test]
    fn test_fallback_duration_is_reported() {
        let mut source = source_with(vec![WindowInfo::new("spotify.Spotify", "A - B")])
            .with_fallback_duration(Some(180_000));
        assert_eq!(source.poll().unwrap().unwrap().duration_ms, 180_000);
    }
}
