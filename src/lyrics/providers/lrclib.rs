use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::lyrics::{LrcParser, LyricsCache, LyricsDocument, LyricsProvider, LyricsQuery};

const DEFAULT_BASE_URL: &str = "https://lrclib.net/api";
const USER_AGENT: &str = concat!("nowplaying-lyrics/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One LRCLIB record, as returned by both `/search` and `/get/{id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    id: i64,
    #[serde(default)]
    plain_lyrics: Option<String>,
    #[serde(default)]
    synced_lyrics: Option<String>,
}

/// LRCLIB lyrics provider
///
/// Searches by track, artist and (when known) album, then fetches the first
/// hit by id. Synced lyrics are preferred over plain ones.
pub struct LrclibProvider {
    client: reqwest::Client,
    base_url: String,
    parser: LrcParser,
    cache: Option<LyricsCache>,
}

impl LrclibProvider {
    pub fn new(parser: LrcParser, cache: Option<LyricsCache>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            parser,
            cache,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn search(&self, query: &LyricsQuery) -> Result<Vec<LrclibRecord>, ProviderError> {
        let mut params = vec![
            ("track_name", query.title.as_str()),
            ("artist_name", query.artist.as_str()),
        ];
        if !query.album.is_empty() {
            params.push(("album_name", query.album.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "LRCLIB search returned HTTP {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn get(&self, id: i64) -> Result<Option<LrclibRecord>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/get/{}", self.base_url, id))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Api(format!("LRCLIB get returned HTTP {}", status)));
        }
        Ok(Some(response.json().await?))
    }
}

/// Picks the synced text if present, plain text otherwise.
fn document_from_record(
    query: &LyricsQuery,
    record: &LrclibRecord,
    parser: &LrcParser,
) -> Option<LyricsDocument> {
    let text = [&record.synced_lyrics, &record.plain_lyrics]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())?;

    Some(LyricsDocument::from_text(query, text, "lrclib", parser)).filter(LyricsDocument::is_valid)
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &str {
        "lrclib"
    }

    fn cache(&self) -> Option<&LyricsCache> {
        self.cache.as_ref()
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        let hits = self.search(query).await?;
        debug!("LRCLIB returned {} hits for {} - {}", hits.len(), query.artist, query.title);

        let Some(first) = hits.first() else {
            return Ok(None);
        };
        let Some(record) = self.get(first.id).await? else {
            return Ok(None);
        };

        Ok(document_from_record(query, &record, &self.parser))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn record(json: &str) -> LrclibRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_synced_lyrics_preferred() {
        let query = LyricsQuery::new("Song A", "Artist X", "");
        let rec = record(
            r#"{"id": 7, "trackName": "Song A", "plainLyrics": "one\ntwo",
                "syncedLyrics": "[00:01.00]one\n[00:02.00]two"}"#,
        );

        let doc = document_from_record(&query, &rec, &LrcParser::default()).unwrap();
        assert!(doc.has_synced_lyrics);
        assert_eq!(doc.source, "lrclib");
        assert_eq!(doc.lines[1].start_ms, Some(2000));
        assert_eq!(doc.title, "Song A");
    }

    #[test]
    fn test_plain_lyrics_fallback() {
        let query = LyricsQuery::new("Song A", "Artist X", "");
        let rec = record(r#"{"id": 7, "plainLyrics": "one\ntwo", "syncedLyrics": "  "}"#);

        let doc = document_from_record(&query, &rec, &LrcParser::default()).unwrap();
        assert!(!doc.has_synced_lyrics);
        assert_eq!(doc.lines.len(), 2);
    }

    #[test]
    fn test_instrumental_has_no_document() {
        let query = LyricsQuery::new("Song A", "Artist X", "");
        let rec = record(r#"{"id": 7, "plainLyrics": null, "syncedLyrics": null, "instrumental": true}"#);
        assert!(document_from_record(&query, &rec, &LrcParser::default()).is_none());
    }

    #[tokio::test]
    async fn test_search_then_get_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("track_name", "Song A"))
            .and(query_param("artist_name", "Artist X"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 42, "plainLyrics": "one"},
                {"id": 43, "plainLyrics": "other"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42,
                "plainLyrics": "one\ntwo",
                "syncedLyrics": "[00:01.00]one\n[00:02.00]two"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = LrclibProvider::new(LrcParser::default(), Some(LyricsCache::new(dir.path())))
            .with_base_url(&format!("{}/", server.uri()));
        let query = LyricsQuery::new("Song A", "Artist X", "");

        let doc = provider.get_lyrics(&query).await.unwrap().unwrap();
        assert!(doc.has_synced_lyrics);
        assert_eq!(doc.lines.len(), 2);

        // served from disk the second time
        assert_eq!(provider.get_lyrics(&query).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_missing_record_and_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("track_name", "Gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 9}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("track_name", "Broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = LrclibProvider::new(LrcParser::default(), None).with_base_url(&server.uri());

        let gone = LyricsQuery::new("Gone", "Artist X", "");
        assert!(provider.fetch(&gone).await.unwrap().is_none());

        let broken = LyricsQuery::new("Broken", "Artist X", "");
        assert!(matches!(provider.fetch(&broken).await, Err(ProviderError::Api(_))));
    }
}
