//! Candidate-code extraction from free-form message text.

use std::sync::LazyLock;

use regex::Regex;

/// Cap per message so one giant paste cannot monopolize the ledger.
const MAX_CODES_PER_MESSAGE: usize = 50;

static CODE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9][A-Za-z0-9._\-/]*").expect("code token pattern compiles")
});

/// Pull code-like tokens out of a message: alphanumeric head, then any run of
/// alphanumerics, dots, underscores, dashes, slashes.
pub fn extract_codes(text: &str) -> Vec<String> {
    CODE_TOKEN
        .find_iter(text)
        .take(MAX_CODES_PER_MESSAGE)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_lines_and_spaces() {
        assert_eq!(
            extract_codes("abc-1 XYZ.2\nthird/3"),
            vec!["abc-1", "XYZ.2", "third/3"]
        );
    }

    #[test]
    fn skips_punctuation_noise() {
        assert_eq!(extract_codes("?? !! ,,"), Vec::<String>::new());
        assert_eq!(extract_codes("(AB-1), [cd_2]!"), vec!["AB-1", "cd_2"]);
    }

    #[test]
    fn token_must_start_alphanumeric() {
        assert_eq!(extract_codes("-abc"), vec!["abc"]);
    }

    #[test]
    fn caps_at_fifty_tokens() {
        let text = (0..80).map(|i| format!("code{i}")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_codes(&text).len(), MAX_CODES_PER_MESSAGE);
    }
}
