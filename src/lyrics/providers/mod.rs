mod genius;
mod local;
mod lrclib;
mod netease;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{expand_home, Config};
use crate::lyrics::{LrcParser, LyricsCache, LyricsProvider};

pub use genius::GeniusProvider;
pub use local::LocalProvider;
pub use lrclib::LrclibProvider;
pub use netease::NeteaseProvider;

/// Builds every enabled provider from the configuration, paired with its
/// configured priority.
pub fn get_enabled_providers(config: &Config) -> Vec<(Arc<dyn LyricsProvider>, Option<u32>)> {
    let lyrics = &config.lyrics;
    let parser = LrcParser::new(config.sync.last_line_window_ms);
    let cache_root = lyrics.resolved_cache_dir();
    let cache_for = |name: &str| {
        lyrics
            .cache_enabled
            .then(|| LyricsCache::new(cache_root.join(name)))
    };

    debug!("Configured lyrics providers: {:?}", lyrics.providers);

    let mut providers: Vec<(Arc<dyn LyricsProvider>, Option<u32>)> = Vec::new();
    for entry in lyrics.providers.iter().filter(|p| p.enabled) {
        let provider: Arc<dyn LyricsProvider> = match entry.name.as_str() {
            "local" => Arc::new(LocalProvider::new(
                expand_home(&lyrics.local_dir),
                lyrics.matching.local_threshold,
                parser,
            )),
            "lrclib" => Arc::new(LrclibProvider::new(parser, cache_for("lrclib"))),
            "netease" => Arc::new(NeteaseProvider::new(
                lyrics.matching.clone(),
                parser,
                cache_for("netease"),
            )),
            "genius" => match lyrics.genius_token() {
                Some(token) => Arc::new(GeniusProvider::new(
                    token,
                    lyrics.matching.clone(),
                    cache_for("genius"),
                )),
                None => {
                    warn!("Genius is enabled but no API token is configured");
                    continue;
                }
            },
            other => {
                warn!("Unknown lyrics provider: {}", other);
                continue;
            }
        };
        providers.push((provider, entry.priority));
    }

    info!("Loaded {} lyrics providers", providers.len());
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEntry;

    #[test]
    fn test_default_providers() {
        let mut config = Config::default();
        config.lyrics.genius_token = Some("token".to_string());
        let providers = get_enabled_providers(&config);
        let names: Vec<&str> = providers.iter().map(|(p, _)| p.name()).collect();
        assert_eq!(names, vec!["local", "lrclib", "netease", "genius"]);
        assert_eq!(providers[2].1, Some(2));
        assert!(providers[3].0.cache().is_some());

        // local files are never cached
        assert!(providers[0].0.cache().is_none());
        assert!(providers[1].0.cache().is_some());
    }

    #[test]
    fn test_disabled_and_unknown_are_skipped() {
        let mut config = Config::default();
        config.lyrics.cache_enabled = false;
        config.lyrics.providers = vec![
            ProviderEntry {
                enabled: false,
                ..ProviderEntry::new("local", 0)
            },
            ProviderEntry::new("qqmusic", 1),
            ProviderEntry::new("lrclib", 2),
        ];

        let providers = get_enabled_providers(&config);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0.name(), "lrclib");
        assert!(providers[0].0.cache().is_none());
    }
}
