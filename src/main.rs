use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nowplaying_lyrics::app::{App, ControlCommand, PlaybackController};
use nowplaying_lyrics::config::{Config, OutputMode};

/// Shows time-synced lyrics for whatever is playing
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Output format, overrides the config file
    #[arg(long, value_enum)]
    output: Option<OutputMode>,

    /// Delete every cached lyrics document and exit
    #[arg(long)]
    clear_cache: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads control commands from stdin on a plain thread and answers each
/// with `ok` or `unsupported`.
fn spawn_command_reader(controller: PlaybackController) -> std::io::Result<()> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match line.parse::<ControlCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                };
                let ok = controller.send_blocking(command);
                println!("{}", if ok { "ok" } else { "unsupported" });
                if command == ControlCommand::Quit {
                    break;
                }
            }
            debug!("Command reader exiting");
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = Config::load(args.config)?;
    if let Some(output) = args.output {
        config.display.output = output;
    }
    let app = App::new(Arc::new(config));

    if args.clear_cache {
        let removed = app.lyrics_manager().clear_all_caches();
        info!("Removed {} cached lyrics documents", removed);
        return Ok(());
    }

    let (controller, commands) = PlaybackController::channel(16);
    spawn_command_reader(controller)?;

    app.run(commands).await
}
