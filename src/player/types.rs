use serde::Serialize;

/// How much a source's snapshots can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Real metadata read from a player or service
    #[default]
    Full,
    /// Synthetic "something is probably playing" guess with no real metadata
    Degraded,
}

/// Operations a source supports. Anything not declared here is never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_play: bool,
    pub can_pause: bool,
    pub can_next: bool,
    pub can_previous: bool,
    pub can_seek: bool,
    pub can_shuffle: bool,
    pub can_repeat: bool,
    /// Whether polls carry a real playback position
    pub reports_position: bool,
}

impl Capabilities {
    /// Every control plus position reporting.
    pub fn full() -> Self {
        Self {
            can_play: true,
            can_pause: true,
            can_next: true,
            can_previous: true,
            can_seek: true,
            can_shuffle: true,
            can_repeat: true,
            reports_position: true,
        }
    }

    /// Read-only source without usable position.
    pub fn none() -> Self {
        Self::default()
    }
}

/// One source's best-effort reading of the current track.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackSnapshot {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork_ref: Option<String>,
    /// 0 when unknown
    pub duration_ms: u64,
    pub position_ms: u64,
    pub is_playing: bool,
    pub source_name: String,
    pub native_id: Option<String>,
    /// Stamped by the arbiter from the producing source
    pub confidence: Confidence,
    /// Stamped by the arbiter from the producing source
    pub reports_position: bool,
}

impl TrackSnapshot {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        }
    }

    /// A snapshot is usable when it names a title or an artist.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() || !self.artist.trim().is_empty()
    }
}

/// Why playback appears stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PauseKind {
    #[default]
    None,
    /// The source went silent or reported a pause on its own
    Auto,
    /// Paused through the local control surface
    Manual,
}

/// Unified state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackView {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork_ref: Option<String>,
    pub duration_ms: u64,
    pub estimated_position_ms: u64,
    pub is_playing: bool,
    pub pause_kind: PauseKind,
    pub active_lyric_line_index: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_validity() {
        assert!(TrackSnapshot::new("Song", "").is_valid());
        assert!(TrackSnapshot::new("", "Artist").is_valid());
        assert!(!TrackSnapshot::new("  ", "").is_valid());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = PlaybackView {
            title: "Song A".to_string(),
            pause_kind: PauseKind::Manual,
            active_lyric_line_index: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "Song A");
        assert_eq!(json["pauseKind"], "MANUAL");
        assert_eq!(json["activeLyricLineIndex"], 3);
        assert_eq!(json["estimatedPositionMs"], 0);
    }
}
