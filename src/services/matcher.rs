//! Fuzzy comparison of a free-text guess against a track title.

/// Tokens that start a featured-artist credit; everything after them is dropped.
const FEATURE_TOKENS: [&str; 4] = ["ft.", "feat.", "feat", "featuring"];

/// Titles shorter than this only match exactly or by ratio.
const MIN_SINGLE_EDIT_LEN: usize = 3;

/// Accepts guesses whose normalized similarity to the title clears a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerMatcher {
    threshold: f64,
}

impl AnswerMatcher {
    /// `threshold` is a normalized Levenshtein similarity in `[0, 1]`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn is_match(&self, answer: &str, title: &str) -> bool {
        let answer = normalize(answer);
        let title = normalize(title);
        if answer.is_empty() || title.is_empty() {
            return false;
        }
        if answer == title {
            return true;
        }
        // Short titles cannot absorb a typo under the ratio alone.
        let single_edit = self.threshold < 1.0
            && title.chars().count() >= MIN_SINGLE_EDIT_LEN
            && strsim::levenshtein(&answer, &title) <= 1;
        single_edit || strsim::normalized_levenshtein(&answer, &title) >= self.threshold
    }
}

/// Reduce a title or guess to lowercase alphanumeric words.
///
/// Bracketed content and featured-artist credits are removed, dashes split words
/// and any other punctuation disappears.
pub fn normalize(text: &str) -> String {
    let lowered = strip_brackets(&text.to_lowercase());
    let spaced = lowered
        .chars()
        .map(|ch| if is_dash(ch) { ' ' } else { ch })
        .collect::<String>();

    spaced
        .split_whitespace()
        .take_while(|word| !FEATURE_TOKENS.contains(word))
        .map(|word| word.chars().filter(|ch| ch.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_brackets(text: &str) -> String {
    let mut depth = 0usize;
    let mut kept = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => kept.push(ch),
            _ => {}
        }
    }
    kept
}

fn is_dash(ch: char) -> bool {
    matches!(
        ch,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> AnswerMatcher {
        AnswerMatcher::new(0.8)
    }

    #[test]
    fn normalize_strips_decoration() {
        assert_eq!(normalize("  Billie Jean (2008 Remaster) "), "billie jean");
        assert_eq!(normalize("Mr. Brightside [Live]"), "mr brightside");
        assert_eq!(normalize("Stay ft. Justin Bieber"), "stay");
        assert_eq!(normalize("Under Pressure featuring Bowie"), "under pressure");
        assert_eq!(normalize("Rock\u{2014}and\u{2013}Roll"), "rock and roll");
        assert_eq!(normalize("Don't Stop Me Now!"), "dont stop me now");
    }

    #[test]
    fn accepts_case_and_decoration_differences() {
        assert!(matcher().is_match("thriller", "Thriller"));
        assert!(matcher().is_match("billie jean (remaster)", "Billie Jean"));
        assert!(matcher().is_match("dont stop me now", "Don't Stop Me Now"));
        assert!(matcher().is_match("stay", "Stay (feat. Justin Bieber)"));
    }

    #[test]
    fn tolerates_a_single_typo() {
        assert!(matcher().is_match("thriler", "Thriller"));
        assert!(matcher().is_match("bohemian rapsody", "Bohemian Rhapsody"));
    }

    #[test]
    fn short_titles_tolerate_one_edit() {
        assert!(matcher().is_match("jamp", "Jump"));
        assert!(matcher().is_match("halp", "Help!"));
        assert!(matcher().is_match("rgv", "RGB"));
        assert!(!matcher().is_match("jmap", "Jump"));
        assert!(!matcher().is_match("us", "Up"));
        assert!(!AnswerMatcher::new(1.0).is_match("jamp", "Jump"));
    }

    #[test]
    fn rejects_unrelated_titles() {
        assert!(!matcher().is_match("africa", "Bohemian Rhapsody"));
        assert!(!matcher().is_match("thriller", "Beat It"));
    }

    #[test]
    fn empty_guesses_never_match() {
        assert!(!matcher().is_match("", "Thriller"));
        assert!(!matcher().is_match("(remix)", "Thriller"));
    }
}
