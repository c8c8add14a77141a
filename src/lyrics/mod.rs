mod cache;
mod manager;
pub mod parser;
pub mod providers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProviderError;

pub use cache::LyricsCache;
pub use manager::{LyricsManager, DEFAULT_PROVIDER_PRIORITY};
pub use parser::LrcParser;

/// One lyric line. Untimed lines carry no start/end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    pub text: String,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

impl LyricLine {
    pub fn synced(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_ms: None,
            end_ms: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.start_ms.is_some() && self.end_ms.is_some()
    }
}

/// A fetched lyrics document, also the on-disk cache entry format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsDocument {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Raw text as the provider returned it
    #[serde(default)]
    pub lyrics_text: String,
    #[serde(default)]
    pub lines: Vec<LyricLine>,
    pub source: String,
    #[serde(default)]
    pub has_synced_lyrics: bool,
}

impl LyricsDocument {
    /// Builds a document from raw provider text, parsing it as LRC when it
    /// is time-coded.
    pub fn from_text(query: &LyricsQuery, text: &str, source: &str, parser: &LrcParser) -> Self {
        let lines = parser.parse(text);
        let has_synced_lyrics = lines.iter().any(LyricLine::is_synced);
        Self {
            title: query.title.clone(),
            artist: query.artist.clone(),
            album: query.album.clone(),
            lyrics_text: text.to_string(),
            lines,
            source: source.to_string(),
            has_synced_lyrics,
        }
    }

    /// Valid when there is raw text or at least one line.
    pub fn is_valid(&self) -> bool {
        !self.lyrics_text.trim().is_empty() || !self.lines.is_empty()
    }
}

/// What to look lyrics up for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LyricsQuery {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// 0 when unknown
    pub duration_ms: u64,
}

impl LyricsQuery {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Lyrics backend
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Persistent cache owned by this provider, if any.
    fn cache(&self) -> Option<&LyricsCache> {
        None
    }

    /// Looks the track up on the backend, bypassing any cache.
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError>;

    /// Disk cache first, then the backend. A successful fetch is written back.
    /// Cache failures are logged and never fail the lookup.
    async fn get_lyrics(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        if let Some(cache) = self.cache() {
            match cache.load(query) {
                Ok(Some(doc)) if doc.is_valid() => {
                    debug!("{} cache hit: {} - {}", self.name(), query.artist, query.title);
                    return Ok(Some(doc));
                }
                Ok(_) => {}
                Err(e) => warn!("{} cache read failed: {}", self.name(), e),
            }
        }

        let Some(doc) = self.fetch(query).await?.filter(LyricsDocument::is_valid) else {
            return Ok(None);
        };

        if let Some(cache) = self.cache() {
            if let Err(e) = cache.store(query, &doc) {
                warn!("{} cache write failed: {}", self.name(), e);
            }
        }
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        cache: LyricsCache,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LyricsProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn cache(&self) -> Option<&LyricsCache> {
            Some(&self.cache)
        }

        async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Some(LyricsDocument::from_text(
                query,
                "[00:01.00]hello",
                "counting",
                &LrcParser::default(),
            )))
        }
    }

    #[test]
    fn test_document_validity() {
        let query = LyricsQuery::new("Song", "Artist", "");
        let parser = LrcParser::default();
        assert!(!LyricsDocument::from_text(&query, "  \n", "x", &parser).is_valid());

        let doc = LyricsDocument::from_text(&query, "[00:01.00]hi", "x", &parser);
        assert!(doc.is_valid());
        assert!(doc.has_synced_lyrics);

        let doc = LyricsDocument::from_text(&query, "just words", "x", &parser);
        assert!(!doc.has_synced_lyrics);
    }

    #[tokio::test]
    async fn test_get_lyrics_writes_through_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Counting {
            cache: LyricsCache::new(dir.path()),
            fetches: AtomicUsize::new(0),
        };
        let query = LyricsQuery::new("Song A", "Artist X", "");

        let first = provider.get_lyrics(&query).await.unwrap().unwrap();
        let second = provider.get_lyrics(&query).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_refetched_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Counting {
            cache: LyricsCache::new(dir.path()),
            fetches: AtomicUsize::new(0),
        };
        let query = LyricsQuery::new("Song A", "Artist X", "");
        std::fs::write(provider.cache.path_for(&query), "{ not json").unwrap();
        assert!(provider.cache.load(&query).is_err());

        let doc = provider.get_lyrics(&query).await.unwrap().unwrap();
        assert_eq!(doc.lines[0].text, "hello");
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

        assert_eq!(provider.cache.load(&query).unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_unwritable_cache_still_returns_lyrics() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the cache directory should be
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let provider = Counting {
            cache: LyricsCache::new(&blocked),
            fetches: AtomicUsize::new(0),
        };
        let query = LyricsQuery::new("Song A", "Artist X", "");

        assert!(provider.get_lyrics(&query).await.unwrap().is_some());
        assert!(provider.get_lyrics(&query).await.unwrap().is_some());
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }
}
