use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::LineParseError;
use crate::lyrics::LyricLine;

/// Provisional length of the last synced line.
pub const DEFAULT_LAST_LINE_WINDOW_MS: u64 = 5000;

fn time_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d+):(\d{1,2})(?:[.:](\d{1,3}))?\]").expect("valid time tag pattern")
    })
}

fn metadata_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[([a-zA-Z#]+):([^\]]*)\]\s*$").expect("valid metadata tag pattern")
    })
}

/// LRC parser
///
/// Time-coded lines look like `[mm:ss.xx]text` or `[mm:ss.xxx]text`; a line
/// may carry several leading tags. Anything else in a time-coded document
/// is skipped line by line.
#[derive(Debug, Clone, Copy)]
pub struct LrcParser {
    last_line_window_ms: u64,
}

impl Default for LrcParser {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_LINE_WINDOW_MS)
    }
}

impl LrcParser {
    pub fn new(last_line_window_ms: u64) -> Self {
        Self {
            last_line_window_ms,
        }
    }

    /// Parses time-coded text when it has at least one valid tagged line,
    /// plain text otherwise.
    pub fn parse(&self, content: &str) -> Vec<LyricLine> {
        if is_time_coded(content) {
            self.parse_synced(content)
        } else {
            parse_plain(content)
        }
    }

    /// Parses time-coded text. Lines come back sorted by start time with
    /// each line ending where the next begins.
    pub fn parse_synced(&self, content: &str) -> Vec<LyricLine> {
        let mut timed: Vec<(u64, String)> = Vec::new();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok((timestamps, text)) => {
                    for start in timestamps {
                        timed.push((start, text.clone()));
                    }
                }
                Err(e) => debug!("Skipping lyric line {}: {}", number + 1, e),
            }
        }

        // stable: equal timestamps keep their original order
        timed.sort_by_key(|(start, _)| *start);

        let starts: Vec<u64> = timed.iter().map(|(start, _)| *start).collect();
        timed
            .into_iter()
            .enumerate()
            .map(|(i, (start, text))| {
                let end = starts
                    .get(i + 1)
                    .copied()
                    .unwrap_or_else(|| start.saturating_add(self.last_line_window_ms));
                LyricLine::synced(text, start, end)
            })
            .collect()
    }
}

/// Splits plain text into unsynced lines, dropping blank ones.
pub fn parse_plain(content: &str) -> Vec<LyricLine> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(LyricLine::plain)
        .collect()
}

/// Whether any line of `content` starts with a valid time tag.
pub fn is_time_coded(content: &str) -> bool {
    content.lines().any(|line| parse_line(line.trim()).is_ok())
}

/// Parses one tagged line into its start times and text.
pub fn parse_line(line: &str) -> Result<(Vec<u64>, String), LineParseError> {
    if let Some(caps) = metadata_tag().captures(line) {
        return Err(LineParseError::Metadata(caps[1].to_string()));
    }

    let mut timestamps = Vec::new();
    let mut rest = line;
    while let Some(caps) = time_tag().captures(rest) {
        timestamps.push(tag_to_ms(&caps)?);
        rest = &rest[caps[0].len()..];
    }

    if timestamps.is_empty() {
        if let Some(tag) = rest.strip_prefix('[').and_then(|r| r.split(']').next()) {
            return Err(LineParseError::InvalidTimestamp(tag.to_string()));
        }
        return Err(LineParseError::MissingTimestamp);
    }

    Ok((timestamps, rest.trim().to_string()))
}

fn tag_to_ms(caps: &regex::Captures<'_>) -> Result<u64, LineParseError> {
    let invalid = || LineParseError::InvalidTimestamp(caps[0].to_string());

    let minutes: u64 = caps[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = caps[2].parse().map_err(|_| invalid())?;
    let fraction_ms = match caps.get(3).map(|m| m.as_str()) {
        None => 0,
        Some(digits) => {
            let value: u64 = digits.parse().map_err(|_| invalid())?;
            match digits.len() {
                1 => value * 100,
                2 => value * 10,
                _ => value,
            }
        }
    };

    minutes
        .checked_mul(60_000)
        .and_then(|ms| ms.checked_add(seconds * 1000 + fraction_ms))
        .ok_or_else(invalid)
}

/// Stretches or clamps the last synced line to end at the track duration.
pub fn fit_to_duration(lines: &mut [LyricLine], duration_ms: u64) {
    if duration_ms == 0 {
        return;
    }
    if let Some(last) = lines.last_mut() {
        if let Some(start) = last.start_ms {
            last.end_ms = Some(duration_ms.max(start));
        }
    }
}

/// The text of every line, without timing.
pub fn plain_text(lines: &[LyricLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
