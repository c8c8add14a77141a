use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CacheError;
use crate::lyrics::{LyricsDocument, LyricsQuery};

/// Persistent lyrics cache, one JSON file per track.
///
/// Entries are written to a temporary file in the same directory and then
/// renamed into place, so readers never observe a partial entry.
#[derive(Debug, Clone)]
pub struct LyricsCache {
    dir: PathBuf,
}

impl LyricsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// md5 hex digest of lowercase `artist-title`.
    pub fn key_for(artist: &str, title: &str) -> String {
        let raw = format!("{}-{}", artist.to_lowercase(), title.to_lowercase());
        format!("{:x}", md5::compute(raw.as_bytes()))
    }

    pub fn path_for(&self, query: &LyricsQuery) -> PathBuf {
        self.dir
            .join(format!("{}.json", Self::key_for(&query.artist, &query.title)))
    }

    pub fn load(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, CacheError> {
        let path = self.path_for(query);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn store(&self, query: &LyricsQuery, doc: &LyricsDocument) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        let path = self.path_for(query);
        tmp.persist(&path)?;
        debug!("Cached lyrics at {:?}", path);
        Ok(())
    }

    /// Removes every entry and returns how many were deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
