use tracing::{debug, info};

use crate::player::{PauseKind, TrackIdentity, TrackSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Playing,
    PausedAuto,
    PausedManual,
}

/// What a single observation did to the reconciled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new identity became active; per-track state must be reset
    TrackChanged,
    /// Same track, playback resumed
    Resumed,
    /// Same track, same play state, fresh metadata/position
    Updated,
    /// Same track stopped reporting playback or went silent
    AutoPaused,
    /// Observation ignored (manual pause, or still silent)
    Held,
    /// Sustained silence, the track was dropped
    Cleared,
    /// Nothing known and nothing observed
    Idle,
}

/// Reconciles arbiter output with local pause actions.
///
/// Silence from the sources never blanks the active track: it moves to
/// `PausedAuto` and keeps the last metadata until `clear_after` consecutive
/// empty cycles. A manual pause freezes a deep copy of the active snapshot
/// which survives any amount of silence.
#[derive(Debug)]
pub struct PauseReconciler {
    state: ReconcilerState,
    identity: Option<TrackIdentity>,
    active: Option<TrackSnapshot>,
    frozen: Option<TrackSnapshot>,
    missed_polls: u32,
    clear_after: u32,
}

impl PauseReconciler {
    pub fn new(clear_after: u32) -> Self {
        Self {
            state: ReconcilerState::Playing,
            identity: None,
            active: None,
            frozen: None,
            missed_polls: 0,
            clear_after: clear_after.max(1),
        }
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    pub fn pause_kind(&self) -> PauseKind {
        match self.state {
            ReconcilerState::Playing => PauseKind::None,
            ReconcilerState::PausedAuto => PauseKind::Auto,
            ReconcilerState::PausedManual => PauseKind::Manual,
        }
    }

    pub fn identity(&self) -> Option<&TrackIdentity> {
        self.identity.as_ref()
    }

    /// The snapshot presentation should show.
    pub fn active(&self) -> Option<&TrackSnapshot> {
        self.active.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.state != ReconcilerState::Playing
    }

    /// Feeds one arbitration result.
    pub fn observe(&mut self, snapshot: Option<TrackSnapshot>) -> Transition {
        let snapshot = snapshot.filter(|s| s.is_valid());

        let Some(snapshot) = snapshot else {
            return self.observe_silence();
        };
        let Some(identity) = TrackIdentity::of(&snapshot) else {
            return self.observe_silence();
        };
        self.missed_polls = 0;

        if self.identity.as_ref() != Some(&identity) {
            info!(
                "Track changed: {} - {} ({})",
                snapshot.artist, snapshot.title, snapshot.source_name
            );
            self.state = if snapshot.is_playing {
                ReconcilerState::Playing
            } else {
                ReconcilerState::PausedAuto
            };
            self.identity = Some(identity);
            self.active = Some(snapshot);
            self.frozen = None;
            return Transition::TrackChanged;
        }

        match self.state {
            ReconcilerState::PausedManual => {
                if !snapshot.is_playing {
                    return Transition::Held;
                }
                // the player itself resumed
                debug!("Source reports playback during manual pause, resuming");
                let mut restored = self.frozen.take().unwrap_or_else(|| snapshot.clone());
                restored.position_ms = snapshot.position_ms;
                restored.is_playing = true;
                self.active = Some(restored);
                self.state = ReconcilerState::Playing;
                Transition::Resumed
            }
            previous => {
                let playing = snapshot.is_playing;
                self.active = Some(snapshot);
                match (previous, playing) {
                    (ReconcilerState::PausedAuto, true) => {
                        self.state = ReconcilerState::Playing;
                        Transition::Resumed
                    }
                    (ReconcilerState::Playing, false) => {
                        self.state = ReconcilerState::PausedAuto;
                        Transition::AutoPaused
                    }
                    _ => Transition::Updated,
                }
            }
        }
    }

    fn observe_silence(&mut self) -> Transition {
        if self.identity.is_none() {
            return Transition::Idle;
        }

        match self.state {
            ReconcilerState::PausedManual => Transition::Held,
            state => {
                self.missed_polls += 1;
                if self.missed_polls >= self.clear_after {
                    info!("No source data for {} cycles, clearing", self.missed_polls);
                    self.clear();
                    return Transition::Cleared;
                }

                if let Some(active) = self.active.as_mut() {
                    active.is_playing = false;
                }
                if state == ReconcilerState::Playing {
                    self.state = ReconcilerState::PausedAuto;
                    Transition::AutoPaused
                } else {
                    Transition::Held
                }
            }
        }
    }

    /// Local pause. Freezes the active snapshot at `position_ms`.
    /// Returns false when there is no track to pause.
    pub fn pause_manually(&mut self, position_ms: u64) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        active.position_ms = position_ms;
        active.is_playing = false;

        self.frozen = Some(active.clone());
        self.state = ReconcilerState::PausedManual;
        self.missed_polls = 0;
        true
    }

    /// Local resume. Restores the frozen snapshot as the active one.
    pub fn resume_manually(&mut self) -> Option<&TrackSnapshot> {
        if self.identity.is_none() {
            return None;
        }

        if let Some(mut restored) = self.frozen.take() {
            restored.is_playing = true;
            self.active = Some(restored);
        } else if let Some(active) = self.active.as_mut() {
            active.is_playing = true;
        }
        self.state = ReconcilerState::Playing;
        self.missed_polls = 0;
        self.active.as_ref()
    }

    /// Drops everything, back to the initial state.
    pub fn clear(&mut self) {
        self.state = ReconcilerState::Playing;
        self.identity = None;
        self.active = None;
        self.frozen = None;
        self.missed_polls = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(title: &str, playing: bool, position_ms: u64) -> TrackSnapshot {
        let mut s = TrackSnapshot::new(title, "Artist X");
        s.album = "Album".to_string();
        s.duration_ms = 200_000;
        s.position_ms = position_ms;
        s.is_playing = playing;
        s
    }

    #[test]
    fn test_initial_state() {
        let mut r = PauseReconciler::new(3);
        assert_eq!(r.state(), ReconcilerState::Playing);
        assert!(r.active().is_none());
        assert_eq!(r.observe(None), Transition::Idle);
    }

    #[test]
    fn test_new_identity_changes_track() {
        let mut r = PauseReconciler::new(3);
        assert_eq!(r.observe(Some(snap("A", true, 0))), Transition::TrackChanged);
        assert_eq!(r.observe(Some(snap("A", true, 2000))), Transition::Updated);
        assert_eq!(r.active().unwrap().position_ms, 2000);
        assert_eq!(r.observe(Some(snap("B", true, 0))), Transition::TrackChanged);
        assert_eq!(r.active().unwrap().title, "B");
    }

    #[test]
    fn test_silence_is_auto_pause_with_metadata_kept() {
        let mut r = PauseReconciler::new(3);
        r.observe(Some(snap("A", true, 5000)));

        assert_eq!(r.observe(None), Transition::AutoPaused);
        assert_eq!(r.pause_kind(), PauseKind::Auto);
        let active = r.active().unwrap();
        assert_eq!(active.title, "A");
        assert_eq!(active.album, "Album");
        assert!(!active.is_playing);

        assert_eq!(r.observe(None), Transition::Held);
        assert_eq!(r.observe(Some(snap("A", true, 9000))), Transition::Resumed);
        assert_eq!(r.state(), ReconcilerState::Playing);
    }

    #[test]
    fn test_sustained_silence_clears() {
        let mut r = PauseReconciler::new(3);
        r.observe(Some(snap("A", true, 0)));
        assert_eq!(r.observe(None), Transition::AutoPaused);
        assert_eq!(r.observe(None), Transition::Held);
        assert_eq!(r.observe(None), Transition::Cleared);
        assert!(r.active().is_none());
        assert!(r.identity().is_none());
    }

    #[test]
    fn test_source_reported_pause_is_auto() {
        let mut r = PauseReconciler::new(3);
        r.observe(Some(snap("A", true, 0)));
        assert_eq!(r.observe(Some(snap("A", false, 100))), Transition::AutoPaused);
        assert_eq!(r.pause_kind(), PauseKind::Auto);
    }

    #[test]
    fn test_manual_pause_survives_silence_and_resumes_frozen() {
        let mut r = PauseReconciler::new(2);
        r.observe(Some(snap("A", true, 1000)));
        assert!(r.pause_manually(42_000));
        assert_eq!(r.pause_kind(), PauseKind::Manual);

        for _ in 0..10 {
            assert_eq!(r.observe(None), Transition::Held);
        }
        let frozen = r.active().unwrap().clone();
        assert_eq!(frozen.position_ms, 42_000);
        assert_eq!(frozen.title, "A");
        assert!(!frozen.is_playing);

        let restored = r.resume_manually().unwrap();
        assert!(restored.is_playing);
        assert_eq!(restored.position_ms, 42_000);
        assert_eq!(restored.album, "Album");
        assert_eq!(r.state(), ReconcilerState::Playing);
    }

    #[test]
    fn test_manual_pause_ignores_paused_reports_and_resumes_on_playing_evidence() {
        let mut r = PauseReconciler::new(3);
        r.observe(Some(snap("A", true, 1000)));
        r.pause_manually(1500);

        let mut changed = snap("A", false, 1500);
        changed.album = "Other".to_string();
        assert_eq!(r.observe(Some(changed)), Transition::Held);
        assert_eq!(r.active().unwrap().album, "Album");

        assert_eq!(r.observe(Some(snap("A", true, 1800))), Transition::Resumed);
        let active = r.active().unwrap();
        assert!(active.is_playing);
        assert_eq!(active.position_ms, 1800);
        assert_eq!(r.pause_kind(), PauseKind::None);
    }

    #[test]
    fn test_new_track_during_manual_pause_resets() {
        let mut r = PauseReconciler::new(3);
        r.observe(Some(snap("A", true, 0)));
        r.pause_manually(100);
        assert_eq!(r.observe(Some(snap("B", true, 0))), Transition::TrackChanged);
        assert_eq!(r.state(), ReconcilerState::Playing);

        // a new track that is not playing starts auto paused
        assert_eq!(r.observe(Some(snap("C", false, 0))), Transition::TrackChanged);
        assert_eq!(r.state(), ReconcilerState::PausedAuto);
    }

    #[test]
    fn test_manual_actions_without_track() {
        let mut r = PauseReconciler::new(3);
        assert!(!r.pause_manually(0));
        assert!(r.resume_manually().is_none());
    }
}
