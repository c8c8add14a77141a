use crate::lyrics::LyricLine;

/// Active line and the one after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePosition {
    pub index: usize,
    pub next: Option<usize>,
}

/// Maps a playback position onto a lyric line.
///
/// The active line is the last one starting at or before
/// `position + look_ahead`. Before the first timestamp the first line is
/// active; past the last timestamp the last line stays active.
#[derive(Debug, Clone)]
pub struct LyricSynchronizer {
    look_ahead_ms: u64,
    current: Option<usize>,
}

impl LyricSynchronizer {
    pub fn new(look_ahead_ms: u64) -> Self {
        Self {
            look_ahead_ms,
            current: None,
        }
    }

    /// Stateless lookup. `None` for empty or untimed lyrics.
    pub fn locate(&self, lines: &[LyricLine], position_ms: u64) -> Option<LinePosition> {
        if lines.is_empty() || !lines.iter().all(LyricLine::is_synced) {
            return None;
        }

        let target = position_ms.saturating_add(self.look_ahead_ms);
        let started = lines.partition_point(|line| line.start_ms.is_some_and(|start| start <= target));
        let index = started.saturating_sub(1);
        let next = (index + 1 < lines.len()).then_some(index + 1);

        Some(LinePosition { index, next })
    }

    /// Returns the new position only when the active line changed since the
    /// last call.
    pub fn update(&mut self, lines: &[LyricLine], position_ms: u64) -> Option<LinePosition> {
        let located = self.locate(lines, position_ms);
        let index = located.map(|p| p.index);
        if index == self.current {
            return None;
        }
        self.current = index;
        located
    }

    /// Index reported by the last transition.
    pub fn active(&self) -> Option<usize> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
