//! Small text heuristics shared by the analyzers.

const QUESTION_OPENERS: [&str; 6] = ["how", "what", "when", "where", "why", "who"];

const ACKNOWLEDGEMENTS: [&str; 8] = ["ok", "yes", "no", "maybe", "k", "cool", "nice", "thanks"];

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercased word tokens with surrounding punctuation removed.
///
/// Apostrophes inside words are kept (`what's`, `can't`).
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
}

/// True when `word` appears as a whole token.
pub fn contains_word(text: &str, word: &str) -> bool {
    tokens(text).any(|t| t == word)
}

/// Case-insensitive match of a keyword or phrase.
///
/// Single words must match a whole token, multi-word phrases match as substrings.
pub fn contains_term(text: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    if term.contains(' ') || !term.chars().all(|c| c.is_alphanumeric() || c == '\'') {
        text.to_lowercase().contains(&term)
    } else {
        contains_word(text, &term)
    }
}

/// True when any of the terms matches (see [`contains_term`]).
pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(text, term))
}

/// A question either ends with `?` or opens with an interrogative.
pub fn is_question(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.ends_with('?') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    QUESTION_OPENERS.iter().any(|opener| lower.starts_with(opener))
}

/// True when the message uses an acknowledgement token (`ok`, `cool`, `thanks`, ...).
pub fn has_acknowledgement(text: &str) -> bool {
    tokens(text).any(|t| ACKNOWLEDGEMENTS.contains(&t.as_str()))
}

/// True for pictographic emoji and common symbol emoji.
pub fn contains_emoji(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F2FF)
    })
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Renders seconds as seconds, minutes, hours or days.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.0} seconds", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1} minutes", seconds / 60.0)
    } else if seconds < 86400.0 {
        format!("{:.1} hours", seconds / 3600.0)
    } else {
        format!("{:.1} days", seconds / 86400.0)
    }
}
