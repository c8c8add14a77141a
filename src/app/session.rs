use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::lyrics::parser::fit_to_duration;
use crate::lyrics::{LyricsDocument, LyricsQuery};
use crate::player::{
    Confidence, PauseKind, PauseReconciler, PlaybackView, TrackIdentity, TrackSnapshot, Transition,
};
use crate::sync::PlaybackPositionEstimator;

/// A lyrics lookup the slow loop should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub identity: TrackIdentity,
    pub query: LyricsQuery,
}

/// A finished lookup, tagged with the identity it was started for.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub identity: TrackIdentity,
    pub document: Option<Arc<LyricsDocument>>,
}

/// Outcome of one slow-loop observation.
#[derive(Debug)]
pub struct TickReport {
    pub transition: Transition,
    pub fetch: Option<FetchRequest>,
}

/// Read-only copy of the session handed to the fast loop.
///
/// `generation` changes whenever the track or its lyrics change, so readers
/// know when to reset line tracking.
#[derive(Debug, Clone, Default)]
pub struct SharedPlayback {
    pub generation: u64,
    pub identity: Option<TrackIdentity>,
    pub snapshot: Option<TrackSnapshot>,
    pub pause_kind: PauseKind,
    pub lyrics: Option<Arc<LyricsDocument>>,
    pub estimator: PlaybackPositionEstimator,
}

impl SharedPlayback {
    /// Unified state for presentation, `None` when nothing is playing.
    pub fn view(&self, position_ms: u64, active_line: Option<usize>) -> Option<PlaybackView> {
        let snapshot = self.snapshot.as_ref()?;
        Some(PlaybackView {
            title: snapshot.title.clone(),
            artist: snapshot.artist.clone(),
            album: snapshot.album.clone(),
            artwork_ref: snapshot.artwork_ref.clone(),
            duration_ms: snapshot.duration_ms,
            estimated_position_ms: position_ms,
            is_playing: snapshot.is_playing && self.pause_kind == PauseKind::None,
            pause_kind: self.pause_kind,
            active_lyric_line_index: active_line,
        })
    }
}

/// Per-track state owned by the slow loop: the reconciled snapshot, the
/// position anchor, the lyrics, and fetch bookkeeping.
pub struct PlaybackSession {
    reconciler: PauseReconciler,
    estimator: PlaybackPositionEstimator,
    lyrics: Option<Arc<LyricsDocument>>,
    /// Identities with a lookup currently running; survives track changes
    in_flight: HashSet<TrackIdentity>,
    /// Identity whose lookup already completed
    fetched_for: Option<TrackIdentity>,
    generation: u64,
}

impl PlaybackSession {
    pub fn new(clear_after_missed_polls: u32) -> Self {
        Self {
            reconciler: PauseReconciler::new(clear_after_missed_polls),
            estimator: PlaybackPositionEstimator::new(),
            lyrics: None,
            in_flight: HashSet::new(),
            fetched_for: None,
            generation: 0,
        }
    }

    pub fn reconciler(&self) -> &PauseReconciler {
        &self.reconciler
    }

    pub fn lyrics(&self) -> Option<&Arc<LyricsDocument>> {
        self.lyrics.as_ref()
    }

    pub fn estimate(&self, now: Instant) -> u64 {
        self.estimator.estimate(now)
    }

    /// Feeds one arbitration result.
    pub fn observe(&mut self, snapshot: Option<TrackSnapshot>, now: Instant) -> TickReport {
        let reports_position = snapshot.as_ref().is_some_and(|s| s.reports_position);
        let transition = self.reconciler.observe(snapshot);

        match transition {
            Transition::TrackChanged => {
                self.reset_track();
                self.anchor_active(now);
            }
            Transition::Resumed => {
                if reports_position {
                    self.anchor_active(now);
                } else {
                    self.estimator.resume(now);
                }
            }
            Transition::Updated => {
                if reports_position {
                    self.anchor_active(now);
                } else if let Some(active) = self.reconciler.active() {
                    self.estimator.set_duration(active.duration_ms);
                }
            }
            Transition::AutoPaused => {
                if reports_position {
                    self.anchor_active(now);
                } else {
                    self.estimator.freeze(now);
                }
            }
            Transition::Cleared => {
                self.reset_track();
                self.estimator.reset();
            }
            Transition::Held | Transition::Idle => {}
        }

        TickReport {
            transition,
            fetch: self.next_fetch(),
        }
    }

    fn reset_track(&mut self) {
        self.lyrics = None;
        self.fetched_for = None;
        self.generation += 1;
    }

    fn anchor_active(&mut self, now: Instant) {
        if let Some(active) = self.reconciler.active() {
            self.estimator
                .anchor(active.position_ms, active.duration_ms, active.is_playing, now);
        }
    }

    /// At most one lookup per identity, and never for synthetic snapshots.
    fn next_fetch(&mut self) -> Option<FetchRequest> {
        let active = self.reconciler.active()?;
        let identity = self.reconciler.identity()?;

        if active.confidence == Confidence::Degraded
            || active.title.trim().is_empty()
            || active.artist.trim().is_empty()
        {
            return None;
        }
        if self.in_flight.contains(identity) || self.fetched_for.as_ref() == Some(identity) {
            return None;
        }

        let query = LyricsQuery::new(&active.title, &active.artist, &active.album)
            .with_duration(active.duration_ms);
        debug!("Requesting lyrics for {} ({})", active.title, identity);

        self.in_flight.insert(identity.clone());
        Some(FetchRequest {
            identity: identity.clone(),
            query,
        })
    }

    /// Applies a finished lookup. Results for any other identity than the
    /// current one are dropped.
    pub fn apply_lyrics(&mut self, result: FetchResult) -> bool {
        self.in_flight.remove(&result.identity);
        if self.reconciler.identity() != Some(&result.identity) {
            debug!("Dropping stale lyrics result for {}", result.identity);
            return false;
        }

        self.fetched_for = Some(result.identity);
        self.lyrics = result.document.map(|doc| {
            let duration_ms = self.estimator.duration_ms();
            if duration_ms == 0 || !doc.has_synced_lyrics {
                return doc;
            }
            let mut fitted = (*doc).clone();
            fit_to_duration(&mut fitted.lines, duration_ms);
            Arc::new(fitted)
        });
        self.generation += 1;
        true
    }

    /// Local pause. Returns false when there is no track.
    pub fn pause(&mut self, now: Instant) -> bool {
        let position = self.estimator.estimate(now);
        if !self.reconciler.pause_manually(position) {
            return false;
        }
        self.estimator.freeze(now);
        info!("Paused at {} ms", position);
        true
    }

    /// Local resume. Returns false when there is no track.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.reconciler.resume_manually().is_none() {
            return false;
        }
        self.estimator.resume(now);
        info!("Resumed at {} ms", self.estimator.estimate(now));
        true
    }

    pub fn seek(&mut self, position_ms: u64, now: Instant) {
        if self.reconciler.active().is_some() {
            self.estimator.seek(position_ms, now);
        }
    }

    /// Explicit clear: forget the track and its lyrics.
    pub fn clear(&mut self) {
        self.reconciler.clear();
        self.reset_track();
        self.estimator.reset();
    }

    pub fn publish(&self) -> SharedPlayback {
        SharedPlayback {
            generation: self.generation,
            identity: self.reconciler.identity().cloned(),
            snapshot: self.reconciler.active().cloned(),
            pause_kind: self.reconciler.pause_kind(),
            lyrics: self.lyrics.clone(),
            estimator: self.estimator,
        }
    }
}
