use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::app::{
    ControlCommand, ControlRequest, FetchRequest, FetchResult, PlaybackSession, SharedPlayback,
};
use crate::config::Config;
use crate::display::{presenter_for, DisplayManager};
use crate::lyrics::providers::get_enabled_providers;
use crate::lyrics::LyricsManager;
use crate::player::sources::build_arbiter;
use crate::player::{spawn_source_worker, ControlOp, SourceHandle};

pub struct App {
    config: Arc<Config>,
    lyrics: Arc<LyricsManager>,
    shared: Arc<RwLock<SharedPlayback>>,
}

impl App {
    /// Builds the application with every configured lyrics provider.
    pub fn new(config: Arc<Config>) -> Self {
        let lyrics = Arc::new(LyricsManager::with_providers(get_enabled_providers(&config)));
        Self::with_lyrics_manager(config, lyrics)
    }

    pub fn with_lyrics_manager(config: Arc<Config>, lyrics: Arc<LyricsManager>) -> Self {
        Self {
            config,
            lyrics,
            shared: Arc::new(RwLock::new(SharedPlayback::default())),
        }
    }

    pub fn lyrics_manager(&self) -> &Arc<LyricsManager> {
        &self.lyrics
    }

    /// Runs until Ctrl-C or a `quit` command.
    pub async fn run(&self, mut commands: mpsc::Receiver<ControlRequest>) -> Result<()> {
        let polling = &self.config.polling;

        let sources_config = self.config.sources.clone();
        let sources = spawn_source_worker(
            move || build_arbiter(&sources_config),
            Duration::from_millis(polling.reinit_interval_ms),
        )
        .context("failed to start the source worker")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let presenter = presenter_for(
            self.config.display.output,
            self.config.display.show_header,
            std::io::stdout(),
        );
        let display = DisplayManager::new(self.config.sync.look_ahead_ms, presenter);
        let display_handle = tokio::spawn(display.run(
            Arc::clone(&self.shared),
            Duration::from_millis(polling.fast_tick_ms.max(1)),
            shutdown_rx,
        ));

        let (fetch_tx, mut fetch_rx) = mpsc::channel::<FetchResult>(8);
        let mut session = PlaybackSession::new(polling.clear_after_missed_polls);

        let mut tick = time::interval(Duration::from_millis(polling.slow_tick_ms.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut commands_open = true;

        info!("Running, slow tick {} ms", polling.slow_tick_ms);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let snapshot = sources.poll().await;
                    let report = session.observe(snapshot, Instant::now());
                    if let Some(request) = report.fetch {
                        self.spawn_fetch(request, fetch_tx.clone());
                    }
                    self.publish(&session).await;
                }
                Some(result) = fetch_rx.recv() => {
                    if session.apply_lyrics(result) {
                        self.publish(&session).await;
                    }
                }
                request = commands.recv(), if commands_open => {
                    let Some(request) = request else {
                        debug!("Control channel closed");
                        commands_open = false;
                        continue;
                    };
                    let quit = request.command == ControlCommand::Quit;
                    let ok = handle_command(request.command, &sources, &mut session).await;
                    let _ = request.reply.send(ok);
                    self.publish(&session).await;
                    if quit {
                        info!("Quit requested");
                        break;
                    }
                }
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        if let Err(e) = display_handle.await {
            error!("Display task failed: {}", e);
        }
        Ok(())
    }

    fn spawn_fetch(&self, request: FetchRequest, results: mpsc::Sender<FetchResult>) {
        let lyrics = Arc::clone(&self.lyrics);
        tokio::spawn(async move {
            let document = lyrics.get_lyrics_for(&request.query).await;
            let result = FetchResult {
                identity: request.identity,
                document,
            };
            if results.send(result).await.is_err() {
                debug!("Lyrics result arrived after shutdown");
            }
        });
    }

    async fn publish(&self, session: &PlaybackSession) {
        *self.shared.write().await = session.publish();
    }
}

/// Applies one control command. Source controls report the source's answer;
/// pause and play also update the local pause state.
async fn handle_command(
    command: ControlCommand,
    sources: &SourceHandle,
    session: &mut PlaybackSession,
) -> bool {
    let command = match command {
        ControlCommand::Toggle if session.reconciler().is_paused() => ControlCommand::Play,
        ControlCommand::Toggle => ControlCommand::Pause,
        other => other,
    };

    match command {
        ControlCommand::Play => {
            let ok = sources.control(ControlOp::Play).await;
            session.resume(Instant::now());
            ok
        }
        ControlCommand::Pause => {
            let ok = sources.control(ControlOp::Pause).await;
            session.pause(Instant::now());
            ok
        }
        ControlCommand::Seek(position_ms) => {
            let ok = sources.control(ControlOp::Seek(position_ms)).await;
            if ok {
                session.seek(position_ms, Instant::now());
            }
            ok
        }
        ControlCommand::Next => sources.control(ControlOp::Next).await,
        ControlCommand::Previous => sources.control(ControlOp::Previous).await,
        ControlCommand::Shuffle(enabled) => sources.control(ControlOp::SetShuffle(enabled)).await,
        ControlCommand::Repeat(enabled) => sources.control(ControlOp::SetRepeat(enabled)).await,
        ControlCommand::Clear => {
            session.clear();
            true
        }
        ControlCommand::Quit | ControlCommand::Toggle => true,
    }
}
