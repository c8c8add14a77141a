use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::lyrics::{LyricsDocument, LyricsProvider, LyricsQuery};

/// Priority of providers registered without one; tried last.
pub const DEFAULT_PROVIDER_PRIORITY: u32 = 999;

struct RegisteredProvider {
    provider: Arc<dyn LyricsProvider>,
    priority: u32,
}

/// Lyrics manager
///
/// Tries providers in ascending priority order and keeps every answer in
/// memory for the session. A miss is remembered only when every provider
/// answered cleanly, so a network error does not hide lyrics for the rest
/// of the session.
#[derive(Default)]
pub struct LyricsManager {
    providers: RwLock<Vec<RegisteredProvider>>,
    memory: Mutex<HashMap<String, Option<Arc<LyricsDocument>>>>,
}

impl LyricsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manager from `(provider, priority)` pairs.
    pub fn with_providers(providers: Vec<(Arc<dyn LyricsProvider>, Option<u32>)>) -> Self {
        let manager = Self::new();
        for (provider, priority) in providers {
            manager.register_provider(provider, priority);
        }
        manager
    }

    /// Memory cache key: lowercase `artist_title`.
    pub fn cache_key(artist: &str, title: &str) -> String {
        format!("{}_{}", artist.to_lowercase(), title.to_lowercase())
    }

    pub fn register_provider(&self, provider: Arc<dyn LyricsProvider>, priority: Option<u32>) {
        let priority = priority.unwrap_or(DEFAULT_PROVIDER_PRIORITY);
        info!("Registering lyrics provider {} (priority {})", provider.name(), priority);

        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.push(RegisteredProvider { provider, priority });
        providers.sort_by_key(|p| p.priority);
    }

    /// Changes a provider's priority. Returns false for unknown names.
    pub fn set_provider_priority(&self, name: &str, priority: u32) -> bool {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = providers.iter_mut().find(|p| p.provider.name() == name) else {
            return false;
        };
        entry.priority = priority;
        providers.sort_by_key(|p| p.priority);
        true
    }

    /// Priority of `name`; unregistered names get the default.
    pub fn priority_of(&self, name: &str) -> u32 {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|p| p.provider.name() == name)
            .map_or(DEFAULT_PROVIDER_PRIORITY, |p| p.priority)
    }

    /// Provider names with their priorities, in the order they are tried.
    pub fn provider_priorities(&self) -> Vec<(String, u32)> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|p| (p.provider.name().to_string(), p.priority))
            .collect()
    }

    /// Memory-cached answer for a key, if one exists.
    pub fn cached(&self, artist: &str, title: &str) -> Option<Option<Arc<LyricsDocument>>> {
        self.memory
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&Self::cache_key(artist, title))
            .cloned()
    }

    /// Lyrics for a track, or `None` when no provider has any.
    pub async fn get_lyrics(&self, title: &str, artist: &str, album: &str) -> Option<Arc<LyricsDocument>> {
        self.get_lyrics_for(&LyricsQuery::new(title, artist, album)).await
    }

    pub async fn get_lyrics_for(&self, query: &LyricsQuery) -> Option<Arc<LyricsDocument>> {
        if query.title.trim().is_empty() || query.artist.trim().is_empty() {
            debug!("Title or artist missing, not looking up lyrics");
            return None;
        }

        let key = Self::cache_key(&query.artist, &query.title);
        if let Some(hit) = self.memory.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            debug!("Memory cache hit for {}", key);
            return hit.clone();
        }

        // snapshot the order so no lock is held across awaits
        let providers: Vec<Arc<dyn LyricsProvider>> = self
            .providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|p| Arc::clone(&p.provider))
            .collect();

        let mut clean_miss = true;
        for provider in providers {
            debug!("Trying lyrics provider {}", provider.name());
            match provider.get_lyrics(query).await {
                Ok(Some(doc)) if doc.is_valid() => {
                    info!(
                        "Lyrics found by {}: {} - {} ({} lines)",
                        provider.name(),
                        query.artist,
                        query.title,
                        doc.lines.len()
                    );
                    let doc = Arc::new(doc);
                    self.memory
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(key, Some(Arc::clone(&doc)));
                    return Some(doc);
                }
                Ok(_) => debug!("{} has no lyrics, trying next provider", provider.name()),
                Err(e) => {
                    warn!("{} failed: {}", provider.name(), e);
                    clean_miss = false;
                }
            }
        }

        info!("No lyrics found: {} - {}", query.artist, query.title);
        if clean_miss {
            self.memory
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, None);
        }
        None
    }

    /// Forgets every in-memory answer.
    pub fn clear_cache(&self) {
        self.memory.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Clears the in-memory answers and every provider's disk cache.
    /// Returns how many disk entries were removed.
    pub fn clear_all_caches(&self) -> usize {
        self.clear_cache();
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers
            .iter()
            .filter_map(|p| p.provider.cache().map(|c| (p.provider.name(), c)))
            .map(|(name, cache)| match cache.clear() {
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to clear {} cache: {}", name, e);
                    0
                }
            })
            .sum()
    }
}
