use std::fs;
use std::time::Duration;

use crate::config::{PresencePlayer, ProcessPresenceConfig};
use crate::error::SourceError;
use crate::player::{Capabilities, Confidence, TrackSnapshot, TrackSnapshotSource};

/// Lists running process names.
pub trait ProcessLister: Send {
    fn running(&mut self) -> Result<Vec<String>, SourceError>;
}

/// Reads `/proc/<pid>/comm`.
pub struct ProcfsLister;

impl ProcessLister for ProcfsLister {
    fn running(&mut self) -> Result<Vec<String>, SourceError> {
        let mut names = Vec::new();
        for entry in fs::read_dir("/proc")? {
            let entry = entry?;
            let is_pid = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }
            // processes can exit between read_dir and read
            if let Ok(comm) = fs::read_to_string(entry.path().join("comm")) {
                names.push(comm.trim().to_string());
            }
        }
        Ok(names)
    }
}

/// Degraded fallback: a known player process is running, so something is
/// probably playing. Carries no real metadata and never triggers a lyrics
/// fetch.
pub struct ProcessPresenceSource {
    lister: Box<dyn ProcessLister>,
    players: Vec<PresencePlayer>,
}

impl ProcessPresenceSource {
    pub fn new(lister: Box<dyn ProcessLister>, players: Vec<PresencePlayer>) -> Self {
        Self { lister, players }
    }

    pub fn from_config(config: &ProcessPresenceConfig) -> Self {
        Self::new(Box::new(ProcfsLister), config.players.clone())
    }
}

impl TrackSnapshotSource for ProcessPresenceSource {
    fn name(&self) -> &str {
        "process_presence"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }

    fn min_poll_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn confidence(&self) -> Confidence {
        Confidence::Degraded
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        if self.players.is_empty() {
            return Err(SourceError::Unavailable("no players configured".to_string()));
        }
        self.lister
            .running()
            .map(|_| ())
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        let running: Vec<String> = self
            .lister
            .running()?
            .into_iter()
            .map(|n| n.to_lowercase())
            .collect();

        let found = self
            .players
            .iter()
            .find(|p| running.iter().any(|n| *n == p.process.to_lowercase()));

        Ok(found.map(|player| TrackSnapshot {
            title: format!("Playing in {}", player.display_name),
            is_playing: true,
            source_name: player.display_name.clone(),
            native_id: Some(format!("presence:{}", player.process.to_lowercase())),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::TrackIdentity;

    struct Fixed(Vec<&'static str>);

    impl ProcessLister for Fixed {
        fn running(&mut self) -> Result<Vec<String>, SourceError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn test_first_configured_player_wins() {
        let mut source = ProcessPresenceSource::new(
            Box::new(Fixed(vec!["bash", "VLC", "spotify"])),
            ProcessPresenceConfig::default().players,
        );
        let s = source.poll().unwrap().unwrap();
        assert_eq!(s.title, "Playing in Spotify");
        assert!(s.is_playing);
        assert_eq!(source.confidence(), Confidence::Degraded);

        // identity is stable across polls
        let again = source.poll().unwrap().unwrap();
        assert_eq!(TrackIdentity::of(&s), TrackIdentity::of(&again));
    }

    #[test]
    fn test_nothing_running() {
        let mut source = ProcessPresenceSource::new(
            Box::new(Fixed(vec!["bash"])),
            ProcessPresenceConfig::default().players,
        );
        assert!(source.poll().unwrap().is_none());
    }
}
