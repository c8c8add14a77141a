use std::time::Instant;

/// Interpolates the playback position between coarse polls.
///
/// Holds the last reported position together with the wall-clock instant it
/// was observed at. While playing, the estimate advances with wall-clock
/// time; it is clamped to the duration whenever the duration is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackPositionEstimator {
    anchor_position_ms: u64,
    anchor_at: Option<Instant>,
    duration_ms: u64,
    is_playing: bool,
}

impl PlaybackPositionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the anchor to a freshly reported position.
    pub fn anchor(&mut self, position_ms: u64, duration_ms: u64, is_playing: bool, at: Instant) {
        self.anchor_position_ms = position_ms;
        self.anchor_at = Some(at);
        self.duration_ms = duration_ms;
        self.is_playing = is_playing;
    }

    /// Estimated position at `now`, in `[0, duration]` when the duration is known.
    pub fn estimate(&self, now: Instant) -> u64 {
        let elapsed_ms = match (self.is_playing, self.anchor_at) {
            (true, Some(at)) => now.saturating_duration_since(at).as_millis() as u64,
            _ => 0,
        };
        let position = self.anchor_position_ms.saturating_add(elapsed_ms);

        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    /// Stops advancing, keeping the position reached at `now`.
    pub fn freeze(&mut self, now: Instant) {
        let position = self.estimate(now);
        self.anchor(position, self.duration_ms, false, now);
    }

    /// Starts advancing again from the frozen position.
    pub fn resume(&mut self, now: Instant) {
        let position = self.estimate(now);
        self.anchor(position, self.duration_ms, true, now);
    }

    /// Moves the anchor to `position_ms` without changing the play state.
    pub fn seek(&mut self, position_ms: u64, now: Instant) {
        self.anchor(position_ms, self.duration_ms, self.is_playing, now);
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_clamps_to_duration() {
        let t0 = Instant::now();
        let mut estimator = PlaybackPositionEstimator::new();
        estimator.anchor(10_000, 12_000, true, t0);

        assert_eq!(estimator.estimate(t0 + Duration::from_millis(1500)), 11_500);
        assert_eq!(estimator.estimate(t0 + Duration::from_millis(2500)), 12_000);
    }

    #[test]
    fn test_unknown_duration_is_unbounded() {
        let t0 = Instant::now();
        let mut estimator = PlaybackPositionEstimator::new();
        estimator.anchor(10_000, 0, true, t0);
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(60)), 70_000);
    }

    #[test]
    fn test_paused_does_not_advance() {
        let t0 = Instant::now();
        let mut estimator = PlaybackPositionEstimator::new();
        estimator.anchor(5_000, 100_000, false, t0);
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(10)), 5_000);
    }

    #[test]
    fn test_freeze_and_resume() {
        let t0 = Instant::now();
        let mut estimator = PlaybackPositionEstimator::new();
        estimator.anchor(0, 100_000, true, t0);

        estimator.freeze(t0 + Duration::from_secs(3));
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(30)), 3_000);

        estimator.resume(t0 + Duration::from_secs(30));
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(31)), 4_000);
    }

    #[test]
    fn test_seek_and_reset() {
        let t0 = Instant::now();
        let mut estimator = PlaybackPositionEstimator::new();
        estimator.anchor(0, 100_000, true, t0);
        estimator.seek(50_000, t0 + Duration::from_secs(1));
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(2)), 51_000);

        estimator.reset();
        assert_eq!(estimator.duration_ms(), 0);
        assert_eq!(estimator.estimate(t0 + Duration::from_secs(5)), 0);
    }
}
