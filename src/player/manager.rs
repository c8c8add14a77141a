use std::time::Instant;

use tracing::{debug, info, warn};

use crate::player::{Confidence, ControlOp, TrackSnapshot, TrackSnapshotSource};

struct SourceEntry {
    source: Box<dyn TrackSnapshotSource>,
    priority: u32,
    available: bool,
    last_polled: Option<Instant>,
    last_result: Option<TrackSnapshot>,
}

/// Source arbiter
///
/// Holds the registered sources in priority order and picks one
/// authoritative snapshot per cycle. The source that won the last cycle is
/// asked first and kept while it keeps reporting playback, so two sources
/// that both see the same track do not flap. Control requests go to that
/// source only.
#[derive(Default)]
pub struct SourceArbiter {
    entries: Vec<SourceEntry>,
    current: Option<String>,
}

impl SourceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source. Without an explicit priority the registration
    /// order is used; ties keep registration order.
    pub fn register_source(&mut self, source: Box<dyn TrackSnapshotSource>, priority: Option<u32>) {
        let priority = priority.unwrap_or(self.entries.len() as u32);
        let position = self.entries.partition_point(|e| e.priority <= priority);
        debug!("Registering source {} with priority {}", source.name(), priority);
        self.entries.insert(
            position,
            SourceEntry {
                source,
                priority,
                available: false,
                last_polled: None,
                last_result: None,
            },
        );
    }

    /// Probes every source once and returns how many are available.
    pub fn initialize(&mut self) -> usize {
        for entry in &mut self.entries {
            Self::probe(entry);
        }
        self.available_count()
    }

    /// Re-probes every demoted source and returns how many came back.
    pub fn reinitialize_unavailable(&mut self) -> usize {
        self.entries
            .iter_mut()
            .filter(|e| !e.available)
            .map(Self::probe)
            .filter(|ok| *ok)
            .count()
    }

    fn probe(entry: &mut SourceEntry) -> bool {
        match entry.source.initialize() {
            Ok(()) => {
                if !entry.available {
                    info!("Source {} available", entry.source.name());
                }
                entry.available = true;
            }
            Err(e) => {
                warn!("Source {} unavailable: {}", entry.source.name(), e);
                entry.available = false;
                entry.last_result = None;
            }
        }
        entry.last_polled = None;
        entry.available
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.entries.iter().filter(|e| e.available).count()
    }

    /// Name of the source that won the last selection.
    pub fn current_source(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn poll(&mut self) -> Option<TrackSnapshot> {
        self.poll_at(Instant::now())
    }

    /// One arbitration cycle at `now`.
    pub fn poll_at(&mut self, now: Instant) -> Option<TrackSnapshot> {
        // Sticky preference only applies to sources with real metadata
        let current_idx = self.current_index().filter(|&idx| {
            let entry = &self.entries[idx];
            entry.available && entry.source.confidence() == Confidence::Full
        });

        let mut current_result = None;
        if let Some(idx) = current_idx {
            let snapshot = self.poll_entry(idx, now);
            if let Some(s) = &snapshot {
                if s.is_valid() && s.is_playing {
                    return snapshot;
                }
            }
            current_result = Some(snapshot);
        }

        // Degraded sources are only consulted when no real source has anything
        for confidence in [Confidence::Full, Confidence::Degraded] {
            let mut fallback: Option<(usize, TrackSnapshot)> = None;

            for idx in 0..self.entries.len() {
                let entry = &self.entries[idx];
                if !entry.available || entry.source.confidence() != confidence {
                    continue;
                }

                let snapshot = if Some(idx) == current_idx {
                    current_result.clone().flatten()
                } else {
                    self.poll_entry(idx, now)
                };

                let Some(snapshot) = snapshot.filter(|s| s.is_valid()) else {
                    continue;
                };

                if snapshot.is_playing {
                    self.select(idx);
                    return Some(snapshot);
                }

                if fallback.is_none() {
                    fallback = Some((idx, snapshot));
                }
            }

            if let Some((idx, snapshot)) = fallback {
                self.select(idx);
                return Some(snapshot);
            }
        }

        None
    }

    fn current_index(&self) -> Option<usize> {
        let name = self.current.as_deref()?;
        self.entries.iter().position(|e| e.source.name() == name)
    }

    fn select(&mut self, idx: usize) {
        let name = self.entries[idx].source.name();
        if self.current.as_deref() != Some(name) {
            info!(
                "Authoritative source: {} -> {}",
                self.current.as_deref().unwrap_or("<none>"),
                name
            );
            self.current = Some(name.to_string());
        }
    }

    /// Polls one source, honouring its minimum interval. Errors become "no snapshot".
    fn poll_entry(&mut self, idx: usize, now: Instant) -> Option<TrackSnapshot> {
        let entry = &mut self.entries[idx];

        if let Some(last) = entry.last_polled {
            if now.saturating_duration_since(last) < entry.source.min_poll_interval() {
                return entry.last_result.clone();
            }
        }

        let result = match entry.source.poll() {
            Ok(snapshot) => {
                // capabilities may depend on what the poll found
                let capabilities = entry.source.capabilities();
                let confidence = entry.source.confidence();
                snapshot.map(|mut s| {
                    if s.source_name.is_empty() {
                        s.source_name = entry.source.name().to_string();
                    }
                    s.confidence = confidence;
                    s.reports_position = capabilities.reports_position;
                    s
                })
            }
            Err(e) => {
                debug!("Source {} poll failed: {}", entry.source.name(), e);
                None
            }
        };

        entry.last_polled = Some(now);
        entry.last_result = result.clone();
        result
    }

    /// Routes a control request to the current source. Never fails loudly:
    /// no current source, a missing capability or an adapter error all yield `false`.
    pub fn control(&mut self, op: ControlOp) -> bool {
        let Some(idx) = self.current_index() else {
            debug!("No authoritative source for {:?}", op);
            return false;
        };

        let entry = &mut self.entries[idx];
        if !entry.available {
            return false;
        }
        if !op.is_supported_by(&entry.source.capabilities()) {
            debug!("{} does not support {:?}", entry.source.name(), op);
            return false;
        }

        match op.apply(entry.source.as_mut()) {
            Ok(()) => {
                // the next cycle should observe the effect
                entry.last_polled = None;
                true
            }
            Err(e) => {
                warn!("{:?} on {} failed: {}", op, entry.source.name(), e);
                false
            }
        }
    }

    pub fn play(&mut self) -> bool {
        self.control(ControlOp::Play)
    }

    pub fn pause(&mut self) -> bool {
        self.control(ControlOp::Pause)
    }

    pub fn next(&mut self) -> bool {
        self.control(ControlOp::Next)
    }

    pub fn previous(&mut self) -> bool {
        self.control(ControlOp::Previous)
    }

    pub fn seek(&mut self, position_ms: u64) -> bool {
        self.control(ControlOp::Seek(position_ms))
    }

    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        self.control(ControlOp::SetShuffle(enabled))
    }

    pub fn set_repeat(&mut self, enabled: bool) -> bool {
        self.control(ControlOp::SetRepeat(enabled))
    }
}
