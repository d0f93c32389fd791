//! Text and number predicates.
//!
//! Each predicate carries a short stable identifier used in logs and in
//! query-cache keys; `cache_token` renders `<id>:<payload>` so two queries
//! normalize to the same key exactly when they match the same things.

use regex::Regex;

#[derive(Debug, Clone)]
pub enum TextPredicate {
    Equals(String),
    Contains(String),
    ContainsIgnoreCase(String),
    RegexPartial(Regex),
    RegexFull(Regex),
    Prefix(String),
    Suffix(String),
    Anything,
}

impl TextPredicate {
    /// Compiles a partial-match regex predicate.
    pub fn regex_partial(pattern: &str) -> Result<Self, regex::Error> {
        Ok(TextPredicate::RegexPartial(Regex::new(pattern)?))
    }

    /// Compiles a full-match regex predicate by anchoring the pattern.
    pub fn regex_full(pattern: &str) -> Result<Self, regex::Error> {
        Ok(TextPredicate::RegexFull(Regex::new(&format!(
            "^(?:{pattern})$"
        ))?))
    }

    pub fn id(&self) -> &'static str {
        match self {
            TextPredicate::Equals(_) => "equals",
            TextPredicate::Contains(_) => "contains",
            TextPredicate::ContainsIgnoreCase(_) => "contains-ignore-case",
            TextPredicate::RegexPartial(_) => "regex-partial",
            TextPredicate::RegexFull(_) => "regex-full",
            TextPredicate::Prefix(_) => "prefix",
            TextPredicate::Suffix(_) => "suffix",
            TextPredicate::Anything => "anything",
        }
    }

    pub fn cache_token(&self) -> String {
        match self {
            TextPredicate::Equals(s)
            | TextPredicate::Contains(s)
            | TextPredicate::Prefix(s)
            | TextPredicate::Suffix(s) => format!("{}:{}", self.id(), s),
            TextPredicate::ContainsIgnoreCase(s) => {
                format!("{}:{}", self.id(), s.to_lowercase())
            }
            TextPredicate::RegexPartial(r) | TextPredicate::RegexFull(r) => {
                format!("{}:{}", self.id(), r.as_str())
            }
            TextPredicate::Anything => self.id().to_string(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextPredicate::Equals(s) => text == s,
            TextPredicate::Contains(s) => text.contains(s.as_str()),
            TextPredicate::ContainsIgnoreCase(s) => {
                text.to_lowercase().contains(&s.to_lowercase())
            }
            TextPredicate::RegexPartial(r) => r.is_match(text),
            TextPredicate::RegexFull(r) => r.is_match(text),
            TextPredicate::Prefix(s) => text.starts_with(s.as_str()),
            TextPredicate::Suffix(s) => text.ends_with(s.as_str()),
            TextPredicate::Anything => true,
        }
    }

    /// Byte span of the first match inside `text`, for snippet extraction.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            TextPredicate::Equals(s) => (text == s).then_some((0, text.len())),
            TextPredicate::Contains(s) => {
                text.find(s.as_str()).map(|start| (start, start + s.len()))
            }
            TextPredicate::ContainsIgnoreCase(s) => {
                let haystack = text.to_lowercase();
                let needle = s.to_lowercase();
                // Lowercasing can shift byte offsets for non-ASCII text; the
                // span is only used to center a snippet, so clamp downstream.
                haystack
                    .find(&needle)
                    .map(|start| (start.min(text.len()), (start + needle.len()).min(text.len())))
            }
            TextPredicate::RegexPartial(r) | TextPredicate::RegexFull(r) => {
                r.find(text).map(|m| (m.start(), m.end()))
            }
            TextPredicate::Prefix(s) => text.starts_with(s.as_str()).then_some((0, s.len())),
            TextPredicate::Suffix(s) => text
                .ends_with(s.as_str())
                .then_some((text.len() - s.len(), text.len())),
            TextPredicate::Anything => Some((0, 0)),
        }
    }
}

/// Predicate over numeric constants. Comparison happens in `f64`; exact
/// integer identity additionally holds for values up to 2^53.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberPredicate {
    Equals(f64),
    AtLeast(f64),
    AtMost(f64),
    Between(f64, f64),
}

impl NumberPredicate {
    pub fn id(&self) -> &'static str {
        match self {
            NumberPredicate::Equals(_) => "eq",
            NumberPredicate::AtLeast(_) => "ge",
            NumberPredicate::AtMost(_) => "le",
            NumberPredicate::Between(..) => "between",
        }
    }

    pub fn cache_token(&self) -> String {
        match self {
            NumberPredicate::Equals(v) | NumberPredicate::AtLeast(v) | NumberPredicate::AtMost(v) => {
                format!("{}:{}", self.id(), v)
            }
            NumberPredicate::Between(lo, hi) => format!("{}:{}:{}", self.id(), lo, hi),
        }
    }

    pub fn matches(&self, value: f64) -> bool {
        match self {
            NumberPredicate::Equals(v) => value == *v,
            NumberPredicate::AtLeast(v) => value >= *v,
            NumberPredicate::AtMost(v) => value <= *v,
            NumberPredicate::Between(lo, hi) => value >= *lo && value <= *hi,
        }
    }
}
