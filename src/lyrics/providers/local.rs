use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::lyrics::{LrcParser, LyricsDocument, LyricsProvider, LyricsQuery};
use crate::utils::string_similarity;

const EXTENSIONS: [&str; 2] = ["lrc", "txt"];

/// Local lyrics files provider
///
/// Looks for `.lrc` (preferred) or `.txt` files in one directory. Exact
/// file names are tried first, then the closest fuzzy match above the
/// configured threshold.
pub struct LocalProvider {
    dir: PathBuf,
    threshold: f64,
    parser: LrcParser,
}

impl LocalProvider {
    pub fn new(dir: impl Into<PathBuf>, threshold: f64, parser: LrcParser) -> Self {
        Self {
            dir: dir.into(),
            threshold,
            parser,
        }
    }

    /// File stems that count as an exact match, most specific first.
    fn candidate_stems(query: &LyricsQuery) -> Vec<String> {
        let mut stems = Vec::new();
        if !query.artist.is_empty() {
            stems.push(format!("{} - {}", query.artist, query.title));
            stems.push(format!("{} - {}", query.title, query.artist));
        }
        stems.push(query.title.clone());
        stems.iter().map(|s| s.to_lowercase()).collect()
    }

    fn find_file(&self, query: &LyricsQuery) -> Result<Option<PathBuf>, ProviderError> {
        if !self.dir.is_dir() {
            debug!("Lyrics directory {:?} does not exist", self.dir);
            return Ok(None);
        }

        let mut files: Vec<(PathBuf, String)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || !has_lyrics_extension(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                let stem = stem.to_string_lossy().to_lowercase();
                files.push((path, stem));
            }
        }
        // .lrc before .txt for the same stem
        files.sort_by_key(|(path, _)| extension_rank(path));

        for stem in Self::candidate_stems(query) {
            if let Some((path, _)) = files.iter().find(|(_, s)| *s == stem) {
                debug!("Exact lyrics file match: {:?}", path);
                return Ok(Some(path.clone()));
            }
        }

        let wanted = format!("{} {}", query.title, query.artist);
        let best = files
            .into_iter()
            .map(|(path, stem)| {
                let score = string_similarity(&stem, &wanted);
                (path, score)
            })
            .filter(|(_, score)| *score >= self.threshold)
            .fold(None::<(PathBuf, f64)>, |best, (path, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((path, score)),
            });

        if let Some((path, score)) = &best {
            debug!("Fuzzy lyrics file match: {:?} ({:.2})", path, score);
        }
        Ok(best.map(|(path, _)| path))
    }
}

fn has_lyrics_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn extension_rank(path: &Path) -> usize {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    EXTENSIONS
        .iter()
        .position(|e| *e == ext)
        .unwrap_or(EXTENSIONS.len())
}

#[async_trait]
impl LyricsProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        let Some(path) = self.find_file(query)? else {
            return Ok(None);
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read lyrics file {:?}: {}", path, e);
                return Err(e.into());
            }
        };

        let doc = LyricsDocument::from_text(query, &content, "local", &self.parser);
        if !doc.is_valid() {
            debug!("Lyrics file {:?} is empty", path);
            return Ok(None);
        }
        info!("Loaded local lyrics {:?} ({} lines)", path, doc.lines.len());
        Ok(Some(doc))
    }
}
