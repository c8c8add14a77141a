use std::collections::HashMap;

use tracing::debug;
use zbus::blocking::fdo::DBusProxy;
use zbus::blocking::{proxy::Builder, Connection, Proxy};
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use crate::config::MprisConfig;
use crate::error::SourceError;
use crate::player::{Capabilities, TrackSnapshot, TrackSnapshotSource};

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

fn transient(err: zbus::Error) -> SourceError {
    SourceError::Transient(err.to_string())
}

/// Polls MPRIS players on the D-Bus session bus.
///
/// Picks a playing player first, then a paused one, then any, and sticks
/// with the chosen player while it keeps playing.
pub struct MprisSource {
    blacklist: Vec<String>,
    connection: Option<Connection>,
    current_bus: Option<String>,
    capabilities: Capabilities,
}

struct PlayerReading {
    bus: String,
    status: String,
    snapshot: TrackSnapshot,
    capabilities: Capabilities,
}

impl MprisSource {
    pub fn new(config: &MprisConfig) -> Self {
        Self {
            blacklist: config
                .player_blacklist
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            connection: None,
            current_bus: None,
            capabilities: Capabilities::none(),
        }
    }

    fn connection(&self) -> Result<&Connection, SourceError> {
        self.connection
            .as_ref()
            .ok_or_else(|| SourceError::Unavailable("not connected".to_string()))
    }

    fn player_buses(&self) -> Result<Vec<String>, SourceError> {
        let dbus = DBusProxy::new(self.connection()?).map_err(transient)?;
        let names = dbus.list_names().map_err(|e| transient(e.into()))?;

        Ok(names
            .into_iter()
            .map(|n| n.to_string())
            .filter(|n| n.starts_with(MPRIS_PREFIX))
            .filter(|n| {
                let lower = n.to_lowercase();
                !self.blacklist.iter().any(|k| lower.contains(k.as_str()))
            })
            .collect())
    }

    fn proxy(&self, bus: &str) -> Result<Proxy<'static>, SourceError> {
        Builder::<Proxy<'static>>::new(self.connection()?)
            .destination(bus.to_string())
            .and_then(|b| b.path(MPRIS_PATH))
            .and_then(|b| b.interface(PLAYER_INTERFACE))
            .map(|b| b.cache_properties(CacheProperties::No))
            .and_then(|b| b.build())
            .map_err(transient)
    }

    fn read_player(&self, bus: &str) -> Result<PlayerReading, SourceError> {
        let proxy = self.proxy(bus)?;

        let status: String = proxy.get_property("PlaybackStatus").map_err(transient)?;
        let mut metadata: HashMap<String, OwnedValue> =
            proxy.get_property("Metadata").map_err(transient)?;
        let position_us: i64 = proxy.get_property("Position").unwrap_or(0);

        let flag = |name: &str| proxy.get_property::<bool>(name).unwrap_or(false);
        let capabilities = Capabilities {
            can_play: flag("CanPlay"),
            can_pause: flag("CanPause"),
            can_next: flag("CanGoNext"),
            can_previous: flag("CanGoPrevious"),
            can_seek: flag("CanSeek"),
            can_shuffle: flag("CanControl"),
            can_repeat: flag("CanControl"),
            reports_position: true,
        };

        let snapshot = TrackSnapshot {
            title: take_string(&mut metadata, "xesam:title").unwrap_or_default(),
            artist: take_strings(&mut metadata, "xesam:artist").join(", "),
            album: take_string(&mut metadata, "xesam:album").unwrap_or_default(),
            artwork_ref: take_string(&mut metadata, "mpris:artUrl"),
            duration_ms: take_length_us(&mut metadata).max(0) as u64 / 1000,
            position_ms: position_us.max(0) as u64 / 1000,
            is_playing: status == "Playing",
            source_name: bus.trim_start_matches(MPRIS_PREFIX).to_string(),
            native_id: take_track_id(&mut metadata),
            ..Default::default()
        };

        Ok(PlayerReading {
            bus: bus.to_string(),
            status,
            snapshot,
            capabilities,
        })
    }

    fn with_current<T>(&self, f: impl FnOnce(&Proxy<'static>) -> zbus::Result<T>) -> Result<T, SourceError> {
        let bus = self
            .current_bus
            .as_deref()
            .ok_or_else(|| SourceError::Transient("no active player".to_string()))?;
        let proxy = self.proxy(bus)?;
        f(&proxy).map_err(transient)
    }

    fn call(&self, method: &str) -> Result<(), SourceError> {
        self.with_current(|p| p.call_method(method, &()).map(|_| ()))
    }
}

fn take_string(meta: &mut HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    meta.remove(key)
        .and_then(|v| String::try_from(v).ok())
        .filter(|s| !s.is_empty())
}

fn take_strings(meta: &mut HashMap<String, OwnedValue>, key: &str) -> Vec<String> {
    meta.remove(key)
        .and_then(|v| Vec::<String>::try_from(v).ok())
        .unwrap_or_default()
}

fn take_length_us(meta: &mut HashMap<String, OwnedValue>) -> i64 {
    // some players send u64 instead of the specified i64
    let Some(value) = meta.remove("mpris:length") else {
        return 0;
    };
    match value.try_clone().ok().and_then(|v| i64::try_from(v).ok()) {
        Some(us) => us,
        None => u64::try_from(value).map(|us| us as i64).unwrap_or(0),
    }
}

fn take_track_id(meta: &mut HashMap<String, OwnedValue>) -> Option<String> {
    meta.remove("mpris:trackid")
        .and_then(|v| OwnedObjectPath::try_from(v).ok())
        .map(|p| p.as_str().to_string())
        .filter(|p| !p.ends_with("/NoTrack"))
}

impl TrackSnapshotSource for MprisSource {
    fn name(&self) -> &str {
        "mpris"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        let connection =
            Connection::session().map_err(|e| SourceError::Unavailable(e.to_string()))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<TrackSnapshot>, SourceError> {
        let mut readings = Vec::new();
        for bus in self.player_buses()? {
            match self.read_player(&bus) {
                Ok(reading) if reading.snapshot.is_valid() => readings.push(reading),
                Ok(_) => {}
                Err(e) => debug!("Skipping MPRIS player {}: {}", bus, e),
            }
        }

        let sticky = readings
            .iter()
            .position(|r| Some(&r.bus) == self.current_bus.as_ref() && r.status == "Playing");
        let chosen = sticky
            .or_else(|| readings.iter().position(|r| r.status == "Playing"))
            .or_else(|| readings.iter().position(|r| r.status == "Paused"))
            .or_else(|| (!readings.is_empty()).then_some(0));

        let Some(idx) = chosen else {
            self.capabilities = Capabilities::none();
            return Ok(None);
        };
        let reading = readings.swap_remove(idx);
        self.current_bus = Some(reading.bus);
        self.capabilities = reading.capabilities;
        Ok(Some(reading.snapshot))
    }

    fn play(&mut self) -> Result<(), SourceError> {
        self.call("Play")
    }

    fn pause(&mut self) -> Result<(), SourceError> {
        self.call("Pause")
    }

    fn next(&mut self) -> Result<(), SourceError> {
        self.call("Next")
    }

    fn previous(&mut self) -> Result<(), SourceError> {
        self.call("Previous")
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), SourceError> {
        self.with_current(|p| {
            let current_us: i64 = p.get_property("Position").unwrap_or(0);
            let offset_us = position_ms as i64 * 1000 - current_us;
            p.call_method("Seek", &(offset_us,)).map(|_| ())
        })
    }

    fn set_shuffle(&mut self, enabled: bool) -> Result<(), SourceError> {
        self.with_current(|p| p.set_property("Shuffle", enabled).map_err(zbus::Error::from))
    }

    fn set_repeat(&mut self, enabled: bool) -> Result<(), SourceError> {
        let status = if enabled { "Track" } else { "None" };
        self.with_current(|p| p.set_property("LoopStatus", status).map_err(zbus::Error::from))
    }
}
