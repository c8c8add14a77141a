use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use openssl::rsa::{Padding, Rsa};
use openssl::symm::{encrypt, Cipher};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::error::ProviderError;
use crate::lyrics::{LrcParser, LyricsCache, LyricsDocument, LyricsProvider, LyricsQuery};
use crate::utils::{normalize_title, string_similarity};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_URL: &str = "https://music.163.com/weapi/cloudsearch/pc";
const LYRIC_URL: &str = "https://music.163.com/weapi/song/lyric";
const BASE62_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const WEAPI_PRESET_KEY: &[u8] = b"0CoJUm6Qyw8W8jud";
const WEAPI_IV: &[u8] = b"0102030405060708";
const WEAPI_PUBKEY: &[u8] = b"-----BEGIN PUBLIC KEY-----\nMIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDgtQn2JZ34ZC28NWYpAUd98iZ37BUrX/aKzmFbt7clFSs6sXqHauqKWqdtLkF2KexO40H1YTX8z2lSgBBOAxLsvaklV8k4cBFK9snQXE9/DDaFt6Rr7iVZMldczhC0JNgTz+SHXT6CBHuX3e9SdB1Ua44oncaTWz7OBGLbCiK45wIDAQAB\n-----END PUBLIC KEY-----";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_1_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.87 Safari/537.36";

/// Durations closer than this count as the same recording
const DURATION_TOLERANCE_MS: u64 = 5000;

// 16 random base62 characters
fn random_secret() -> [u8; 16] {
    let mut rng = rand::rng();
    let mut key = [0; 16];
    for byte in key.iter_mut() {
        *byte = BASE62_CHARSET[rng.random_range(0..BASE62_CHARSET.len())];
    }
    key
}

fn aes_128_cbc_b64(data: &[u8], key: &[u8], iv: &[u8]) -> Result<String, ProviderError> {
    let encrypted = encrypt(Cipher::aes_128_cbc(), key, Some(iv), data)?;
    Ok(general_purpose::STANDARD_NO_PAD.encode(encrypted))
}

fn rsa_no_padding(data: &[u8]) -> Result<[u8; 128], ProviderError> {
    let rsa = Rsa::public_key_from_pem(WEAPI_PUBKEY)?;

    // left-pad to the key size
    let mut padded = vec![0; 128 - data.len()];
    padded.extend_from_slice(data);

    let mut out = [0; 128];
    rsa.public_encrypt(&padded, &mut out, Padding::NONE)?;
    Ok(out)
}

#[derive(Serialize, Debug)]
struct WeApiForm {
    params: String,
    #[serde(rename = "encSecKey")]
    enc_sec_key: String,
}

fn weapi_encrypt(data: &Value) -> Result<WeApiForm, ProviderError> {
    let mut secret = random_secret();
    let payload = data.to_string();

    let once = aes_128_cbc_b64(payload.as_bytes(), WEAPI_PRESET_KEY, WEAPI_IV)?;
    let params = aes_128_cbc_b64(once.as_bytes(), &secret, WEAPI_IV)?;

    secret.reverse();
    let enc_sec_key = hex::encode(rsa_no_padding(&secret)?);

    Ok(WeApiForm {
        params,
        enc_sec_key,
    })
}

/// Id of the song that best matches `query`.
///
/// Candidates scoring at least the acceptance threshold win, preferring one
/// whose duration is within tolerance when the duration is known. With no
/// acceptable candidate, returns `None`.
fn best_match(songs: &[Value], query: &LyricsQuery, matching: &MatchingConfig) -> Option<u64> {
    let mut best: Option<(f64, bool, u64)> = None;

    for (i, song) in songs.iter().enumerate() {
        let Some(id) = song["id"].as_u64() else {
            continue;
        };
        let name = song["name"].as_str().unwrap_or_default();
        let title_score = string_similarity(&query.title, name);

        let artist_score = song["ar"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|artist| artist["name"].as_str())
            .map(|artist| string_similarity(&query.artist, artist))
            .fold(0.0, f64::max);

        let score = matching.title_weight * title_score + matching.artist_weight * artist_score;
        let duration_match = query.duration_ms > 0
            && song["dt"]
                .as_u64()
                .is_some_and(|dt| dt.abs_diff(query.duration_ms) < DURATION_TOLERANCE_MS);

        debug!(
            "NetEase result #{}: id {} '{}' title {:.2} artist {:.2} score {:.2}{}",
            i + 1,
            id,
            name,
            title_score,
            artist_score,
            score,
            if duration_match { " (duration match)" } else { "" }
        );

        if score < matching.accept_threshold {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_score, best_duration, _)) => {
                (duration_match, score) > (best_duration, best_score)
            }
        };
        if better {
            best = Some((score, duration_match, id));
        }
    }

    best.map(|(_, _, id)| id)
}

/// Search keywords in the order they are tried, without duplicates.
fn search_keywords(query: &LyricsQuery) -> Vec<String> {
    let mut keywords = vec![
        format!("{} {}", query.title, query.artist),
        query.title.clone(),
        normalize_title(&query.title),
    ];
    keywords.retain(|k| !k.trim().is_empty());
    keywords.dedup();
    keywords
}

/// Original lyrics first, translated lyrics when that is all there is.
fn lyric_text(response: &Value) -> Option<&str> {
    ["/lrc/lyric", "/tlyric/lyric"]
        .into_iter()
        .filter_map(|pointer| response.pointer(pointer)?.as_str())
        .find(|text| !text.trim().is_empty())
}

/// NetEase Cloud Music lyrics provider
pub struct NeteaseProvider {
    client: reqwest::Client,
    matching: MatchingConfig,
    parser: LrcParser,
    cache: Option<LyricsCache>,
}

impl NeteaseProvider {
    pub fn new(matching: MatchingConfig, parser: LrcParser, cache: Option<LyricsCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            matching,
            parser,
            cache,
        }
    }

    async fn post_weapi(&self, url: &str, data: Value) -> Result<Value, ProviderError> {
        let form = weapi_encrypt(&data)?;

        let response = self
            .client
            .post(url)
            .header("Referer", "https://music.163.com/")
            .header("User-Agent", USER_AGENT)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api(format!("NetEase returned HTTP {}", status)));
        }
        Ok(response.json().await?)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Value>, ProviderError> {
        debug!("NetEase search: '{}'", keyword);
        let data = json!({
            "s": keyword,
            "type": 1,
            "offset": 0,
            "total": true,
            "limit": 30,
        });

        let response = self.post_weapi(SEARCH_URL, data).await?;
        Ok(response
            .pointer("/result/songs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn lyric(&self, song_id: u64) -> Result<Option<String>, ProviderError> {
        debug!("NetEase lyric request for id {}", song_id);
        let data = json!({
            "id": song_id,
            "lv": -1,
            "kv": -1,
            "tv": -1,
            "os": "osx",
        });

        let response = self.post_weapi(LYRIC_URL, data).await?;
        Ok(lyric_text(&response).map(str::to_string))
    }
}

#[async_trait]
impl LyricsProvider for NeteaseProvider {
    fn name(&self) -> &str {
        "netease"
    }

    fn cache(&self) -> Option<&LyricsCache> {
        self.cache.as_ref()
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDocument>, ProviderError> {
        let mut fallback = None;
        let mut chosen = None;

        for keyword in search_keywords(query) {
            let songs = self.search(&keyword).await?;
            if fallback.is_none() {
                fallback = songs.first().and_then(|song| song["id"].as_u64());
            }
            if let Some(id) = best_match(&songs, query, &self.matching) {
                chosen = Some(id);
                break;
            }
        }

        let Some(song_id) = chosen.or(fallback) else {
            debug!("NetEase has no results for {} - {}", query.artist, query.title);
            return Ok(None);
        };
        if chosen.is_none() {
            debug!("No NetEase result passed the threshold, using the first hit {}", song_id);
        }

        let Some(text) = self.lyric(song_id).await? else {
            return Ok(None);
        };
        Ok(Some(LyricsDocument::from_text(query, &text, "netease", &self.parser))
            .filter(LyricsDocument::is_valid))
    }
}
