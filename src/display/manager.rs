use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::app::SharedPlayback;
use crate::display::Presenter;
use crate::lyrics::parser::plain_text;
use crate::player::{PauseKind, PlaybackView, TrackIdentity};
use crate::sync::LyricSynchronizer;

/// Fast-loop side of the application.
///
/// Reads the published playback state, estimates the position, and reports
/// line, track and pause transitions to a presenter. Never writes the shared
/// state and never touches the network or disk.
pub struct DisplayManager {
    synchronizer: LyricSynchronizer,
    presenter: Box<dyn Presenter>,
    generation: Option<u64>,
    identity: Option<TrackIdentity>,
    state: Option<(PauseKind, bool)>,
    plain_shown: bool,
}

impl DisplayManager {
    pub fn new(look_ahead_ms: u64, presenter: Box<dyn Presenter>) -> Self {
        Self {
            synchronizer: LyricSynchronizer::new(look_ahead_ms),
            presenter,
            generation: None,
            identity: None,
            state: None,
            plain_shown: false,
        }
    }

    /// Index of the line last reported as active.
    pub fn active_line(&self) -> Option<usize> {
        self.synchronizer.active()
    }

    /// One fast-loop step.
    pub fn render(&mut self, shared: &SharedPlayback, now: Instant) -> std::io::Result<()> {
        let position = shared.estimator.estimate(now);

        if self.generation != Some(shared.generation) {
            self.generation = Some(shared.generation);
            self.synchronizer.reset();
            self.plain_shown = false;
        }

        if self.identity != shared.identity {
            self.identity = shared.identity.clone();
            self.state = None;
            match shared.view(position, None) {
                Some(view) => {
                    debug!("Now showing {} - {}", view.artist, view.title);
                    self.presenter.track_changed(&view)?;
                    self.state = Some((view.pause_kind, view.is_playing));
                }
                None => self.presenter.cleared()?,
            }
        }

        if let Some(doc) = shared.lyrics.as_deref() {
            if !doc.has_synced_lyrics && !doc.lines.is_empty() && !self.plain_shown {
                self.plain_shown = true;
                if let Some(view) = shared.view(position, None) {
                    self.presenter.plain_lyrics(&view, &plain_text(&doc.lines))?;
                }
            }
        }

        let lines = shared
            .lyrics
            .as_deref()
            .map(|doc| doc.lines.as_slice())
            .unwrap_or_default();
        if let Some(located) = self.synchronizer.update(lines, position) {
            if let Some(view) = shared.view(position, Some(located.index)) {
                self.presenter.line_changed(&view, &lines[located.index])?;
            }
        }

        if let Some(view) = shared.view(position, self.synchronizer.active()) {
            let state = Some((view.pause_kind, view.is_playing));
            if state != self.state {
                self.state = state;
                self.presenter.state_changed(&view)?;
            }
        }
        Ok(())
    }

    /// Runs at `tick` until `shutdown` flips to true or its sender is dropped.
    pub async fn run(
        mut self,
        shared: Arc<RwLock<SharedPlayback>>,
        tick: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let state = shared.read().await;
                    if let Err(e) = self.render(&state, Instant::now()) {
                        warn!("Failed to write output: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Display loop stopped");
    }
}
