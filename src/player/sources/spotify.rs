use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::SpotifyConfig;
use crate::error::SourceError;
use crate::player::{Capabilities, TrackSnapshot, TrackSnapshotSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<PlayerItem>,
}

#[derive(Debug, Deserialize)]
struct PlayerItem {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<NamedEntity>,
    album: Option<Album>,
}

#[derive(Debug, Deserialize)]
struct NamedEntity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

/// Spotify Web API "currently playing" source.
///
/// Needs a user access token with `user-read-playback-state` and, for
/// controls, `user-modify-playback-state`.
pub struct SpotifyWebSource {
    api_base: String,
    token: Option<String>,
    client: Option<Client>,
}

impl SpotifyWebSource {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.resolved_token(),
            client: None,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder, SourceError> {
        let (Some(client), Some(token)) = (&self.client, &self.token) else {
            return Err(SourceError::Unavailable("not initialized".to_string()));
        };
        Ok(client
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(token))
    }

    fn command(&self, method: reqwest::Method, path: &str) -> Result<(), SourceError> {
        let resp = self.request(method, path)?.header("Content-Length", "0").send()?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SourceError::Transient(format!("{} returned HTTP {}", path, status)))
        }
    }
}

/// Maps a `/v1/me/player` body to a snapshot. Ads and podcasts without an
/// item yield `None`.
fn snapshot_from_player(body: PlayerResponse) -> Option<TrackSnapshot> {
    let item = body.item?;

    let artist = item
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let (album, artwork_ref) = match item.album {
        Some(album) => (album.name, album.images.into_iter().next().map(|i| i.url)),
        None => (String::new(), None),
    };

    let snapshot = TrackSnapshot {
        title: item.name,
        artist,
        album,
        artwork_ref,
        duration_ms: item.duration_ms,
        position_ms: body.progress_ms.unwrap_or(0),
        is_playing: body.is_playing,
        source_name: "spotify".to_string(),
        native_id: item.id,
        ..Default::default()
    };
    snapshot.is_valid().then_some(snapshot)
}

impl TrackSnapshotSource for SpotifyWebSource {
    fn name(&self) -> &str {
        "spotify"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(1000)
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        if self.token.is_none() {
            return Err(SourceError::Unavailable("no access token configured".to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        self.client = Some(client);

        let resp = self
            .request(reqwest::Method::GET, "/v1/me")?
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            self.client = None;
            return Err(SourceError::Unavailable(format!(
                "token rejected: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        let resp = self.request(reqwest::Method::GET, "/v1/me/player")?.send()?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body: PlayerResponse = resp.json()?;
                Ok(snapshot_from_player(body))
            }
            status => {
                debug!("Spotify player endpoint returned HTTP {}", status);
                Err(SourceError::Transient(format!("HTTP {}", status)))
            }
        }
    }

    fn play(&mut self) -> Result<(), SourceError> {
        self.command(reqwest::Method::PUT, "/v1/me/player/play")
    }

    fn pause(&mut self) -> Result<(), SourceError> {
        self.command(reqwest::Method::PUT, "/v1/me/player/pause")
    }

    fn next(&mut self) -> Result<(), SourceError> {
        self.command(reqwest::Method::POST, "/v1/me/player/next")
    }

    fn previous(&mut self) -> Result<(), SourceError> {
        self.command(reqwest::Method::POST, "/v1/me/player/previous")
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), SourceError> {
        let path = format!("/v1/me/player/seek?position_ms={}", position_ms);
        self.command(reqwest::Method::PUT, &path)
    }

    fn set_shuffle(&mut self, enabled: bool) -> Result<(), SourceError> {
        let path = format!("/v1/me/player/shuffle?state={}", enabled);
        self.command(reqwest::Method::PUT, &path)
    }

    fn set_repeat(&mut self, enabled: bool) -> Result<(), SourceError> {
        let state = if enabled { "track" } else { "off" };
        let path = format!("/v1/me/player/repeat?state={}", state);
        self.command(reqwest::Method::PUT, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_body_to_snapshot() {
        let body: PlayerResponse = serde_json::from_str(
            r#"{
                "is_playing": true,
                "progress_ms": 61234,
                "item": {
                    "id": "3n3Ppam7vgaVa1iaRUc9Lp",
                    "name": "Mr. Brightside",
                    "duration_ms": 222075,
                    "artists": [{"name": "The Killers"}, {"name": "Guest"}],
                    "album": {"name": "Hot Fuss", "images": [{"url": "https://i.scdn.co/image/abc"}]}
                }
            }"#,
        )
        .unwrap();

        let s = snapshot_from_player(body).unwrap();
        assert_eq!(s.title, "Mr. Brightside");
        assert_eq!(s.artist, "The Killers, Guest");
        assert_eq!(s.album, "Hot Fuss");
        assert_eq!(s.artwork_ref.as_deref(), Some("https://i.scdn.co/image/abc"));
        assert_eq!(s.position_ms, 61234);
        assert_eq!(s.duration_ms, 222075);
        assert!(s.is_playing);
        assert_eq!(s.native_id.as_deref(), Some("3n3Ppam7vgaVa1iaRUc9Lp"));
    }

    #[test]
    fn test_missing_item_is_no_snapshot() {
        let body: PlayerResponse =
            serde_json::from_str(r#"{"is_playing": true, "item": null}"#).unwrap();
        assert!(snapshot_from_player(body).is_none());
    }

    #[test]
    fn test_initialize_without_token_is_unavailable() {
        let mut source = SpotifyWebSource {
            api_base: "http://127.0.0.1:9".to_string(),
            token: None,
            client: None,
        };
        assert!(matches!(source.initialize(), Err(SourceError::Unavailable(_))));
        assert!(matches!(source.poll(), Err(SourceError::Unavailable(_))));
    }
}
