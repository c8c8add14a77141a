use std::io::{self, Write};

use serde::Serialize;

use crate::config::OutputMode;
use crate::lyrics::LyricLine;
use crate::player::PlaybackView;

/// Receives presentation events from the display loop.
pub trait Presenter: Send {
    fn track_changed(&mut self, view: &PlaybackView) -> io::Result<()>;

    fn line_changed(&mut self, view: &PlaybackView, line: &LyricLine) -> io::Result<()>;

    /// Untimed lyrics arrived; they are shown once, in full.
    fn plain_lyrics(&mut self, view: &PlaybackView, text: &str) -> io::Result<()>;

    /// Pause kind or play state changed without a track change.
    fn state_changed(&mut self, _view: &PlaybackView) -> io::Result<()> {
        Ok(())
    }

    fn cleared(&mut self) -> io::Result<()>;
}

/// Plain line output: an `artist - title` header per track, then each
/// active lyric line as it becomes active.
pub struct LinePrinter<W: Write + Send> {
    out: W,
    show_header: bool,
}

impl<W: Write + Send> LinePrinter<W> {
    pub fn new(out: W, show_header: bool) -> Self {
        Self { out, show_header }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Presenter for LinePrinter<W> {
    fn track_changed(&mut self, view: &PlaybackView) -> io::Result<()> {
        if !self.show_header {
            return Ok(());
        }
        if view.artist.is_empty() {
            writeln!(self.out, "{}", view.title)?;
        } else {
            writeln!(self.out, "{} - {}", view.artist, view.title)?;
        }
        self.out.flush()
    }

    fn line_changed(&mut self, _view: &PlaybackView, line: &LyricLine) -> io::Result<()> {
        writeln!(self.out, "{}", line.text)?;
        self.out.flush()
    }

    fn plain_lyrics(&mut self, _view: &PlaybackView, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    fn cleared(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlainLyricsEvent<'a> {
    #[serde(flatten)]
    view: &'a PlaybackView,
    plain_lyrics: &'a str,
}

/// One unified-state JSON object per line, emitted on every change.
pub struct JsonPrinter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, event: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write + Send> Presenter for JsonPrinter<W> {
    fn track_changed(&mut self, view: &PlaybackView) -> io::Result<()> {
        self.emit(view)
    }

    fn line_changed(&mut self, view: &PlaybackView, _line: &LyricLine) -> io::Result<()> {
        self.emit(view)
    }

    fn plain_lyrics(&mut self, view: &PlaybackView, text: &str) -> io::Result<()> {
        self.emit(&PlainLyricsEvent {
            view,
            plain_lyrics: text,
        })
    }

    fn state_changed(&mut self, view: &PlaybackView) -> io::Result<()> {
        self.emit(view)
    }

    fn cleared(&mut self) -> io::Result<()> {
        self.emit(&PlaybackView::default())
    }
}

/// Presenter for the configured output mode.
pub fn presenter_for<W: Write + Send + 'static>(
    mode: OutputMode,
    show_header: bool,
    out: W,
) -> Box<dyn Presenter> {
    match mode {
        OutputMode::Lines => Box::new(LinePrinter::new(out, show_header)),
        OutputMode::Json => Box::new(JsonPrinter::new(out)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PauseKind;

    fn view() -> PlaybackView {
        PlaybackView {
            title: "Song A".to_string(),
            artist: "Artist X".to_string(),
            estimated_position_ms: 1500,
            is_playing: true,
            active_lyric_line_index: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_line_printer() {
        let mut printer = LinePrinter::new(Vec::new(), true);
        printer.track_changed(&view()).unwrap();
        printer.line_changed(&view(), &LyricLine::synced("hello", 1000, 2000)).unwrap();
        printer.state_changed(&view()).unwrap();
        printer.plain_lyrics(&view(), "one\ntwo").unwrap();

        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(out, "Artist X - Song A\nhello\none\ntwo\n");
    }

    #[test]
    fn test_line_printer_without_header() {
        let mut printer = LinePrinter::new(Vec::new(), false);
        printer.track_changed(&view()).unwrap();
        assert!(printer.into_inner().is_empty());
    }

    #[test]
    fn test_json_printer() {
        let mut printer = JsonPrinter::new(Vec::new());
        let mut paused = view();
        paused.pause_kind = PauseKind::Manual;
        printer.state_changed(&paused).unwrap();
        printer.plain_lyrics(&view(), "one\ntwo").unwrap();
        printer.cleared().unwrap();

        let out = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["pauseKind"], "MANUAL");
        assert_eq!(lines[0]["estimatedPositionMs"], 1500);
        assert_eq!(lines[0]["activeLyricLineIndex"], 0);
        assert_eq!(lines[1]["title"], "Song A");
        assert_eq!(lines[1]["plainLyrics"], "one\ntwo");
        assert_eq!(lines[2]["title"], "");
        assert!(lines[2].get("plainLyrics").is_none());
    }
}
