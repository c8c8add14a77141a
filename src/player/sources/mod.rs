// Concrete now-playing sources

#[cfg(feature = "mpris")]
mod mpris;
mod presence;
mod spotify;
mod window_title;

use tracing::{info, warn};

use crate::config::SourcesConfig;
use crate::player::SourceArbiter;

#[cfg(feature = "mpris")]
pub use mpris::MprisSource;
pub use presence::{ProcessLister, ProcessPresenceSource, ProcfsLister};
pub use spotify::SpotifyWebSource;
pub use window_title::{
    parse_wmctrl_output, TitlePattern, WindowInfo, WindowLister, WindowTitleSource, WmctrlLister,
};

/// Builds an arbiter with every enabled source, in registration order:
/// Spotify Web API, MPRIS, window titles, process presence.
///
/// Must run on the thread that will own the sources.
pub fn build_arbiter(config: &SourcesConfig) -> SourceArbiter {
    let mut arbiter = SourceArbiter::new();

    if config.spotify.enabled {
        info!("Enabling Spotify Web API source");
        arbiter.register_source(Box::new(SpotifyWebSource::new(&config.spotify)), None);
    }

    if config.mpris.enabled {
        #[cfg(feature = "mpris")]
        {
            info!("Enabling MPRIS source");
            arbiter.register_source(Box::new(MprisSource::new(&config.mpris)), None);
        }
        #[cfg(not(feature = "mpris"))]
        warn!("MPRIS source enabled but this build lacks the `mpris` feature");
    }

    if config.window_title.enabled {
        info!("Enabling window title source");
        arbiter.register_source(
            Box::new(WindowTitleSource::from_config(&config.window_title)),
            None,
        );
    }

    if config.process_presence.enabled {
        info!("Enabling process presence source");
        arbiter.register_source(
            Box::new(ProcessPresenceSource::from_config(&config.process_presence)),
            None,
        );
    }

    if arbiter.is_empty() {
        warn!("No now-playing sources enabled");
    }

    arbiter
}
