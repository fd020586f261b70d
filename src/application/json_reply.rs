//! Helpers for reading JSON out of free-form completion text.

use serde::de::DeserializeOwned;

/// Removes surrounding Markdown code fences (```` ```json ```` or ```` ``` ````).
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parses fenced or bare JSON.
pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fences(raw))
}

/// Fresh id for correlating completion requests in logs.
pub(crate) fn trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  plain "), "plain");
    }

    #[test]
    fn parses_fenced_array() {
        let names: Vec<String> = parse_json("```json\n[\"dating\", \"romance\"]\n```").unwrap();
        assert_eq!(names, vec!["dating", "romance"]);
    }
}
