//! Contestant name normalization and ordered name matchers.

use crate::models::Contestant;

/// Reduce a raw name such as `"Name-Server"` to its comparable short form.
///
/// Returns the part before the first `-`, trimmed; the trimmed input when
/// there is no `-`.
pub fn normalize_name(raw: &str) -> String {
    match raw.split_once('-') {
        Some((head, _)) => head.trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Strategies for finding a contestant by name, tried in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMatcher {
    /// Raw names are identical.
    Exact,
    /// Normalized names are identical.
    Normalized,
}

pub const NAME_MATCH_ORDER: &[NameMatcher] = &[NameMatcher::Exact, NameMatcher::Normalized];

impl NameMatcher {
    pub fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            NameMatcher::Exact => candidate == wanted,
            NameMatcher::Normalized => normalize_name(candidate) == normalize_name(wanted),
        }
    }
}

/// Index of the first contestant matching `wanted`, along with the matcher
/// that found it.
pub fn find_contestant(contestants: &[Contestant], wanted: &str) -> Option<(usize, NameMatcher)> {
    NAME_MATCH_ORDER.iter().find_map(|matcher| {
        contestants
            .iter()
            .position(|c| matcher.matches(&c.name, wanted))
            .map(|idx| (idx, *matcher))
    })
}
