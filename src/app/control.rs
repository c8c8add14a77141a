use std::str::FromStr;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A command accepted by the running application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(u64),
    Shuffle(bool),
    Repeat(bool),
    Clear,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0}")]
pub struct ParseCommandError(String);

fn parse_switch(value: Option<&str>) -> Option<bool> {
    match value?.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();
        let invalid = || ParseCommandError(s.trim().to_string());

        let command = match verb.as_str() {
            "play" => ControlCommand::Play,
            "pause" => ControlCommand::Pause,
            "toggle" => ControlCommand::Toggle,
            "next" => ControlCommand::Next,
            "prev" | "previous" => ControlCommand::Previous,
            "seek" => ControlCommand::Seek(arg.and_then(|a| a.parse().ok()).ok_or_else(invalid)?),
            "shuffle" => ControlCommand::Shuffle(parse_switch(arg).ok_or_else(invalid)?),
            "repeat" => ControlCommand::Repeat(parse_switch(arg).ok_or_else(invalid)?),
            "clear" => ControlCommand::Clear,
            "quit" | "exit" => ControlCommand::Quit,
            _ => return Err(invalid()),
        };
        Ok(command)
    }
}

/// A command plus the channel its outcome is reported on.
#[derive(Debug)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<bool>,
}

/// Outward control surface. Every call reports success and never fails;
/// a stopped application simply answers `false`.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    tx: mpsc::Sender<ControlRequest>,
}

impl PlaybackController {
    pub fn new(tx: mpsc::Sender<ControlRequest>) -> Self {
        Self { tx }
    }

    /// A controller and the receiving end for `App::run`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControlRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, command: ControlCommand) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ControlRequest { command, reply }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Blocking variant of `send` for plain threads. Must not be called
    /// from within the async runtime.
    pub fn send_blocking(&self, command: ControlCommand) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.blocking_send(ControlRequest { command, reply }).is_err() {
            return false;
        }
        rx.blocking_recv().unwrap_or(false)
    }

    pub async fn play(&self) -> bool {
        self.send(ControlCommand::Play).await
    }

    pub async fn pause(&self) -> bool {
        self.send(ControlCommand::Pause).await
    }

    pub async fn next(&self) -> bool {
        self.send(ControlCommand::Next).await
    }

    pub async fn previous(&self) -> bool {
        self.send(ControlCommand::Previous).await
    }

    pub async fn seek(&self, position_ms: u64) -> bool {
        self.send(ControlCommand::Seek(position_ms)).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> bool {
        self.send(ControlCommand::Shuffle(enabled)).await
    }

    pub async fn set_repeat(&self, enabled: bool) -> bool {
        self.send(ControlCommand::Repeat(enabled)).await
    }
}
