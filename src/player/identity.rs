use std::fmt;

use crate::player::TrackSnapshot;
use crate::utils::collapse_whitespace;

/// Fingerprint deciding whether two snapshots describe the same track.
///
/// Built from the source's native id when there is one, otherwise from an
/// md5 digest of the normalized `artist:title` pair, so case and whitespace
/// jitter between polls does not look like a track change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackIdentity(String);

impl TrackIdentity {
    /// `None` for snapshots that name neither a title nor an artist.
    pub fn of(snapshot: &TrackSnapshot) -> Option<Self> {
        if !snapshot.is_valid() {
            return None;
        }
        Some(Self::from_parts(
            snapshot.native_id.as_deref(),
            &snapshot.artist,
            &snapshot.title,
        ))
    }

    pub fn from_parts(native_id: Option<&str>, artist: &str, title: &str) -> Self {
        if let Some(id) = native_id.map(str::trim).filter(|id| !id.is_empty()) {
            return TrackIdentity(format!("id:{}", id));
        }

        let artist = normalize(artist);
        let title = normalize(title);
        let key = match (artist.is_empty(), title.is_empty()) {
            (false, false) => format!("{}:{}", artist, title),
            (true, false) => format!("title:{}", title),
            (false, true) => format!("artist:{}", artist),
            (true, true) => String::new(),
        };

        let digest = format!("{:x}", md5::compute(key.as_bytes()));
        TrackIdentity(format!("track_{}", &digest[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_do_not_change_identity() {
        let a = TrackSnapshot::new("Song  A", "Artist X");
        let b = TrackSnapshot::new(" song a ", "ARTIST   x");
        assert_eq!(TrackIdentity::of(&a), TrackIdentity::of(&b));
    }

    #[test]
    fn test_different_tracks_differ() {
        let a = TrackSnapshot::new("Song A", "Artist X");
        let b = TrackSnapshot::new("Song B", "Artist X");
        assert_ne!(TrackIdentity::of(&a), TrackIdentity::of(&b));
    }

    #[test]
    fn test_native_id_wins_over_metadata() {
        let mut a = TrackSnapshot::new("Song A", "Artist X");
        a.native_id = Some("4uLU6hMCjMI75M1A2tKUQC".to_string());
        let mut b = TrackSnapshot::new("Song A (Remastered)", "Artist X");
        b.native_id = Some("4uLU6hMCjMI75M1A2tKUQC".to_string());

        let id = TrackIdentity::of(&a).unwrap();
        assert_eq!(Some(id.clone()), TrackIdentity::of(&b));
        assert_eq!(id.as_str(), "id:4uLU6hMCjMI75M1A2tKUQC");
    }

    #[test]
    fn test_hashed_identity_shape() {
        let id = TrackIdentity::from_parts(None, "Artist X", "Song A");
        assert!(id.as_str().starts_with("track_"));
        assert_eq!(id.as_str().len(), "track_".len() + 12);

        // title-only and artist-only keys do not collide
        assert_ne!(
            TrackIdentity::from_parts(None, "", "same"),
            TrackIdentity::from_parts(None, "same", "")
        );
    }

    #[test]
    fn test_invalid_snapshot_has_no_identity() {
        assert_eq!(TrackIdentity::of(&TrackSnapshot::default()), None);
    }
}
