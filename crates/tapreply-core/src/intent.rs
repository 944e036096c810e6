use std::sync::LazyLock;

use regex::Regex;
use tapreply_schema::Intent;

/// Ordered rules; the first pattern that matches anywhere in the text wins.
const RULES: &[(Intent, &str)] = &[
    (Intent::Emergency, r"(?i)(help|emergency|doctor|police|ambulance|999)"),
    (Intent::Directions, r"(?i)(where|direction|station|bus|train|map)"),
    (Intent::Payment, r"(?i)(pay|price|card|cash|£|pound)"),
    (Intent::Clarify, r"(?i)(repeat|again|sorry|clarify|what)"),
];

static COMPILED: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .filter_map(|(intent, pattern)| Regex::new(pattern).ok().map(|re| (*intent, re)))
        .collect()
});

/// Keyword classification of a heard utterance. Falls back to [`Intent::Generic`].
pub fn classify(text: &str) -> Intent {
    COMPILED
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Generic)
}
