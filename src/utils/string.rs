use std::sync::OnceLock;

use regex::Regex;

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation pattern"))
}

fn bracketed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid bracket pattern"))
}

/// Strips punctuation and lowercases, used before fuzzy comparisons.
pub fn sanitize_string(input: &str) -> String {
    let result = punctuation().replace_all(input, "");
    collapse_whitespace(&result).to_lowercase()
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in `[0, 1]` based on normalized Levenshtein distance of the sanitized inputs.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a_clean = sanitize_string(a);
    let b_clean = sanitize_string(b);

    if a_clean.is_empty() || b_clean.is_empty() {
        return 0.0;
    }

    strsim::normalized_levenshtein(&a_clean, &b_clean)
}

/// Removes decorations that lyric backends rarely carry:
/// `(Remastered 2011)`, `[Live]`, and anything after ` - `.
pub fn normalize_title(title: &str) -> String {
    let without_brackets = bracketed().replace_all(title, "");
    let head = without_brackets
        .split(" - ")
        .next()
        .unwrap_or(&without_brackets);
    collapse_whitespace(head)
}
