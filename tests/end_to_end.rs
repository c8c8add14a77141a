use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use nowplaying_lyrics::app::{FetchResult, PlaybackSession};
use nowplaying_lyrics::error::{ProviderError, SourceError};
use nowplaying_lyrics::lyrics::{
    LrcParser, LyricsDocument, LyricsManager, LyricsProvider, LyricsQuery,
};
use nowplaying_lyrics::player::{
    Capabilities, PauseKind, ReconcilerState, SourceArbiter, TrackSnapshot, TrackSnapshotSource,
    Transition,
};
use nowplaying_lyrics::sync::LyricSynchronizer;

struct Unavailable;

impl TrackSnapshotSource for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unavailable("not running".to_string()))
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        panic!("an unavailable source must never be polled");
    }
}

struct SongA;

impl TrackSnapshotSource for SongA {
    fn name(&self) -> &str {
        "song-a"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        let mut s = TrackSnapshot::new("Song A", "Artist X");
        s.is_playing = true;
        s.position_ms = 1000;
        s.duration_ms = 200_000;
        Ok(Some(s))
    }
}

struct Fixed {
    name: &'static str,
    text: Option<&'static str>,
    calls: AtomicUsize,
}

impl Fixed {
    fn new(name: &'static str, text: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            name,
            text,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LyricsProvider for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .text
            .map(|text| LyricsDocument::from_text(query, text, self.name, &LrcParser::default())))
    }
}

#[test]
fn test_arbitration_to_fetch_request() {
    let mut arbiter = SourceArbiter::new();
    arbiter.register_source(Box::new(Unavailable), None);
    arbiter.register_source(Box::new(SongA), None);
    assert_eq!(arbiter.initialize(), 1);

    let snapshot = arbiter.poll().expect("snapshot from the available source");
    assert_eq!(snapshot.title, "Song A");
    assert_eq!(snapshot.artist, "Artist X");
    assert_eq!(snapshot.source_name, "song-a");

    let t0 = Instant::now();
    let mut session = PlaybackSession::new(15);
    let report = session.observe(Some(snapshot), t0);
    assert_eq!(report.transition, Transition::TrackChanged);
    assert_eq!(session.reconciler().state(), ReconcilerState::Playing);

    let fetch = report.fetch.expect("one lyrics fetch");
    assert_eq!(fetch.query.title, "Song A");
    assert_eq!(fetch.query.artist, "Artist X");

    // the next cycle must not start a second lookup
    let report = session.observe(arbiter.poll(), t0 + Duration::from_secs(2));
    assert_eq!(report.transition, Transition::Updated);
    assert!(report.fetch.is_none());
}

#[tokio::test]
async fn test_provider_fallback_and_memory_cache() {
    let p1 = Fixed::new("p1", None);
    let p2 = Fixed::new("p2", Some("[00:01.00]first\n[00:04.00]second"));
    let manager = LyricsManager::new();
    manager.register_provider(p1.clone(), Some(0));
    manager.register_provider(p2.clone(), Some(1));

    let doc = manager.get_lyrics("Song A", "Artist X", "").await.unwrap();
    assert_eq!(doc.source, "p2");
    assert!(doc.is_valid());

    let cached = manager.cached("Artist X", "Song A").flatten().unwrap();
    assert!(Arc::ptr_eq(&doc, &cached));
    assert_eq!(LyricsManager::cache_key("Artist X", "Song A"), "artist x_song a");

    manager.get_lyrics("Song A", "Artist X", "").await;
    assert_eq!(p1.calls.load(Ordering::SeqCst), 1);
    assert_eq!(p2.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_pipeline() {
    let mut arbiter = SourceArbiter::new();
    arbiter.register_source(Box::new(SongA), None);
    arbiter.initialize();

    let manager = LyricsManager::new();
    manager.register_provider(Fixed::new("p", Some("[00:00.50]first\n[00:04.00]second")), None);

    let t0 = Instant::now();
    let mut session = PlaybackSession::new(3);
    let fetch = session.observe(arbiter.poll(), t0).fetch.unwrap();
    let document = manager.get_lyrics_for(&fetch.query).await;
    assert!(session.apply_lyrics(FetchResult {
        identity: fetch.identity,
        document,
    }));

    let shared = session.publish();
    let lines = &shared.lyrics.as_ref().unwrap().lines;
    assert_eq!(lines.last().unwrap().end_ms, Some(200_000));

    let mut sync = LyricSynchronizer::new(150);
    // position 1000 at t0
    let at = |ms| shared.estimator.estimate(t0 + Duration::from_millis(ms));
    assert_eq!(sync.update(lines, at(0)).map(|p| p.index), Some(0));
    assert_eq!(sync.update(lines, at(2_000)), None);
    assert_eq!(sync.update(lines, at(2_900)).map(|p| p.index), Some(1));

    // sources go quiet: metadata stays, then clears after three misses
    session.observe(None, t0);
    assert_eq!(session.publish().pause_kind, PauseKind::Auto);
    assert_eq!(session.publish().snapshot.unwrap().title, "Song A");
    session.observe(None, t0);
    assert_eq!(session.observe(None, t0).transition, Transition::Cleared);
    assert!(session.publish().snapshot.is_none());
}
