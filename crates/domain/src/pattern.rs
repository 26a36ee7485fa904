//! Glob and regex matching for URL and text patterns.
//!
//! Glob patterns use `*` for any run of characters and `?` for exactly one
//! character; everything else matches literally. The translated expression
//! is anchored at both ends. Matching fails closed: an empty or invalid
//! pattern never matches.

use regex::{Regex, RegexBuilder};

/// A pattern that could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("invalid regular expression")]
    Regex(#[from] regex::Error),
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Empty`] for an empty pattern.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let regex = Regex::new(&glob_to_regex(pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The original glob text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Test `candidate` against the whole pattern.
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// Translate a glob into an anchored regular expression source.
#[must_use]
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out.push('$');
    out
}

/// Match `candidate` against a glob pattern, failing closed.
#[must_use]
pub fn matches_glob(pattern: &str, candidate: &str) -> bool {
    GlobPattern::new(pattern).is_ok_and(|glob| glob.is_match(candidate))
}

/// Compile a literal regular expression (no glob translation).
///
/// # Errors
///
/// Returns [`PatternError`] when the pattern is empty or not a valid regex.
pub fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()?)
}

/// Search `candidate` with a literal regular expression, failing closed.
#[must_use]
pub fn matches_regex(pattern: &str, candidate: &str, case_insensitive: bool) -> bool {
    compile_regex(pattern, case_insensitive).is_ok_and(|re| re.is_match(candidate))
}
