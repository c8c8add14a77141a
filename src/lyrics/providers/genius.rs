use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::error::ProviderError;
use crate::lyrics::parser::parse_plain;
use crate::lyrics::{LyricsCache, LyricsDocument, LyricsProvider, LyricsQuery};
use crate::utils::{collapse_whitespace, string_similarity};

const DEFAULT_API_BASE: &str = "https://api.genius.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "type", default)]
    kind: String,
    result: SongHit,
}

#[derive(Debug, Clone, Deserialize)]
struct SongHit {
    #[serde(default)]
    title: String,
    url: String,
    primary_artist: Option<ArtistHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct ArtistHit {
    name: String,
}

fn noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\([^)]*\)|\[[^\]]*\]|\b(official|oficial|video|lyrics|audio|hd|4k)\b|[^\w\s]")
            .expect("valid search noise pattern")
    })
}

fn annotation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("valid annotation pattern"))
}

/// Drops bracketed parts, video/audio noise words and punctuation.
fn clean_search_term(text: &str) -> String {
    collapse_whitespace(&noise().replace_all(text, " "))
}

/// Search strings in the order they are tried, without duplicates.
fn search_terms(query: &LyricsQuery) -> Vec<String> {
    let mut terms = vec![
        format!("{} {}", query.title, query.artist),
        format!(
            "{} {}",
            clean_search_term(&query.title),
            clean_search_term(&query.artist)
        ),
        query.title.clone(),
    ];
    for term in terms.iter_mut() {
        *term = term.trim().to_string();
    }
    terms.retain(|t| !t.is_empty());
    terms.dedup();
    terms
}

/// Highest scoring song hit that passes the acceptance threshold.
fn best_hit(hits: &[SearchHit], query: &LyricsQuery, matching: &MatchingConfig) -> Option<SongHit> {
    hits.iter()
        .filter(|hit| hit.kind == "song")
        .map(|hit| {
            let artist = hit
                .result
                .primary_artist
                .as_ref()
                .map(|a| a.name.as_str())
                .unwrap_or_default();
            let score = matching.title_weight * string_similarity(&query.title, &hit.result.title)
                + matching.artist_weight * string_similarity(&query.artist, artist);
            (score, &hit.result)
        })
        .filter(|(score, _)| *score >= matching.accept_threshold)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, song)| song.clone())
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let value = child_element.value();
            if value.name() == "br" {
                out.push('\n');
            } else if value.attr("data-exclude-from-selection").is_none() {
                collect_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Lyrics text from a song page, with section headers and annotations removed.
fn extract_lyrics(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"div[data-lyrics-container="true"]"#).ok()?;

    let mut raw = String::new();
    for container in document.select(&selector) {
        collect_text(container, &mut raw);
        raw.push('\n');
    }

    let cleaned: Vec<String> = raw
        .lines()
        .map(|line| annotation().replace_all(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    (!cleaned.is_empty()).then(|| cleaned.join("\n"))
}

/// Genius lyrics provider
///
/// Searches the Genius API with a client access token and scrapes the
/// matching song page. Genius has no timing, so documents are always plain.
pub struct GeniusProvider {
    client: reqwest::Client,
    api_base: String,
    token: String,
    matching: MatchingConfig,
    cache: Option<LyricsCache>,
}

impl GeniusProvider {
    pub fn new(token: String, matching: MatchingConfig, cache: Option<LyricsCache>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            matching,
            cache,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, ProviderError> {
        debug!("Genius search: '{}'", term);
        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("q", term)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api(format!("Genius search returned HTTP {}", status)));
        }
        let body: SearchResponse = response.json().await?;
        Ok(body.response.hits)
    }

    async fn page(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api(format!("Genius page returned HTTP {}", status)));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl LyricsProvider for GeniusProvider {
    fn name(&self) -> &str {
        "genius"
    }

    fn cache(&self) -> Option<&LyricsCache> {
        self.cache.as_ref()
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        let mut song = None;
        for term in search_terms(query) {
            let hits = self.search(&term).await?;
            song = best_hit(&hits, query, &self.matching);
            if song.is_some() {
                break;
            }
        }

        let Some(song) = song else {
            debug!("Genius has no match for {} - {}", query.artist, query.title);
            return Ok(None);
        };
        debug!("Genius match: {} ({})", song.title, song.url);

        let html = self.page(&song.url).await?;
        let Some(text) = extract_lyrics(&html) else {
            debug!("No lyrics found on {}", song.url);
            return Ok(None);
        };

        Ok(Some(LyricsDocument {
            title: query.title.clone(),
            artist: query.artist.clone(),
            album: query.album.clone(),
            lines: parse_plain(&text),
            lyrics_text: text,
            source: "genius".to_string(),
            has_synced_lyrics: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PAGE: &str = r#"<html><body>
        <div data-lyrics-container="true">
            <div data-exclude-from-selection="true">Song A Lyrics</div>
            [Verse 1]<br>First <i>line</i><br>Second line [x2]<br><br>
        </div>
        <div data-lyrics-container="true">[Chorus]<br>Third &amp; last</div>
    </body></html>"#;

    fn hits(json: serde_json::Value) -> Vec<SearchHit> {
        serde_json::from_value::<SearchResponse>(json).unwrap().response.hits
    }

    #[test]
    fn test_extract_lyrics() {
        assert_eq!(
            extract_lyrics(PAGE).as_deref(),
            Some("First line\nSecond line\nThird & last")
        );
        assert_eq!(extract_lyrics("<html><body><p>nothing</p></body></html>"), None);
    }

    #[test]
    fn test_search_terms() {
        let query = LyricsQuery::new("Song A (Official Video)", "Artist X", "");
        assert_eq!(
            search_terms(&query),
            vec![
                "Song A (Official Video) Artist X".to_string(),
                "Song A Artist X".to_string(),
                "Song A (Official Video)".to_string(),
            ]
        );
    }

    #[test]
    fn test_best_hit_skips_non_songs_and_weak_matches() {
        let query = LyricsQuery::new("Song A", "Artist X", "");
        let hits = hits(serde_json::json!({"response": {"hits": [
            {"type": "album", "result": {"title": "Song A", "url": "u0"}},
            {"type": "song", "result": {"title": "Completely Different", "url": "u1",
                "primary_artist": {"name": "Someone"}}},
            {"type": "song", "result": {"title": "Song A", "url": "u2",
                "primary_artist": {"name": "Artist X"}}}
        ]}}));

        assert_eq!(best_hit(&hits, &query, &MatchingConfig::default()).unwrap().url, "u2");
        assert!(best_hit(&hits[..2], &query, &MatchingConfig::default()).is_none());
    }

    #[tokio::test]
    async fn test_fetch_scrapes_page_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Song A Artist X"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"hits": [{"type": "song", "result": {
                    "title": "Song A",
                    "url": format!("{}/artist-x-song-a-lyrics", server.uri()),
                    "primary_artist": {"name": "Artist X"}
                }}]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artist-x-song-a-lyrics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = GeniusProvider::new(
            "secret".to_string(),
            MatchingConfig::default(),
            Some(LyricsCache::new(dir.path())),
        )
        .with_api_base(&server.uri());
        let query = LyricsQuery::new("Song A", "Artist X", "");

        let doc = provider.get_lyrics(&query).await.unwrap().unwrap();
        assert!(!doc.has_synced_lyrics);
        assert_eq!(doc.source, "genius");
        assert_eq!(doc.lines.len(), 3);
        assert!(doc.lines.iter().all(|l| !l.is_synced()));

        // second lookup never reaches the server
        assert_eq!(provider.get_lyrics(&query).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = GeniusProvider::new("bad".to_string(), MatchingConfig::default(), None)
            .with_api_base(&server.uri());
        let query = LyricsQuery::new("Song A", "Artist X", "");
        assert!(matches!(provider.fetch(&query).await, Err(ProviderError::Api(_))));
    }
}
