//! Key Pattern Module
//!
//! Translates `*` wildcards into an anchored regular expression for
//! family-wide invalidation. Characters other than `*` keep their regex
//! meaning.

use regex::Regex;
use tracing::warn;

// == Key Pattern ==
/// A compiled key pattern. A pattern that fails to compile matches nothing.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Option<Regex>,
}

impl KeyPattern {
    /// Compiles `glob`, logging and neutralising invalid expressions.
    pub fn compile(glob: &str) -> Self {
        let expression = format!("^(?:{})$", glob.replace('*', ".*"));
        let regex = match Regex::new(&expression) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(
                    event = "CACHE_PATTERN_INVALID",
                    pattern = glob,
                    error = %err,
                    "Invalid key pattern, matching nothing"
                );
                None
            }
        };
        Self { regex }
    }

    /// Tests whether the whole key matches.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(key))
    }

    /// True when the pattern compiled.
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_wildcard() {
        let pattern = KeyPattern::compile("user:*");
        assert!(pattern.matches("user:1"));
        assert!(pattern.matches("user:"));
        assert!(!pattern.matches("post:1"));
        assert!(!pattern.matches("a_user:1"), "pattern must be anchored");
    }

    #[test]
    fn test_inner_wildcard() {
        let pattern = KeyPattern::compile("post:*:comments");
        assert!(pattern.matches("post:42:comments"));
        assert!(!pattern.matches("post:42:likes"));
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        let pattern = KeyPattern::compile("config");
        assert!(pattern.matches("config"));
        assert!(!pattern.matches("config:v2"));
    }

    #[test]
    fn test_malformed_pattern_matches_nothing() {
        let pattern = KeyPattern::compile("user:[*");
        assert!(!pattern.is_valid());
        assert!(!pattern.matches("user:[1"));
    }

    #[test]
    fn test_alternation_stays_anchored() {
        let pattern = KeyPattern::compile("a|b");
        assert!(pattern.matches("a"));
        assert!(!pattern.matches("ab"));
    }
}
