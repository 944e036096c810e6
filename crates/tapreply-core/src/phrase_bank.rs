//! Canned replies used when generation is unavailable.

use tapreply_schema::Intent;

const GENERIC: &[&str] = &[
    "Yes.",
    "No.",
    "I’m not sure.",
    "Please repeat.",
    "One moment.",
    "Could you type that?",
    "Thank you.",
    "Sorry, I don’t understand.",
];

const CLARIFY: &[&str] = &[
    "Sorry, can you rephrase?",
    "Could you type that again?",
    "Please speak slowly.",
    "Can you show me on your phone?",
    "Do you mean this?",
    "I understand a little—please repeat.",
];

const DIRECTIONS: &[&str] = &[
    "Please show me on the map.",
    "Where are you going?",
    "Left or right?",
    "Which station?",
    "How far is it?",
    "Can you point to the place?",
];

const PAYMENT: &[&str] = &[
    "Cash or card?",
    "How much is it?",
    "Can you show the price?",
    "I will pay by card.",
    "I don’t have cash.",
    "Please type the amount.",
];

const EMERGENCY: &[&str] = &[
    "I need help.",
    "Please call emergency services.",
    "I need a doctor.",
    "I am lost—can you help me?",
    "Please call 999.",
    "I am not feeling well.",
];

pub fn phrases(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Generic => GENERIC,
        Intent::Clarify => CLARIFY,
        Intent::Directions => DIRECTIONS,
        Intent::Payment => PAYMENT,
        Intent::Emergency => EMERGENCY,
    }
}

/// The first `count` phrases for `intent`. Shorter banks are returned whole.
pub fn fallback(intent: Intent, count: usize) -> Vec<String> {
    phrases(intent)
        .iter()
        .take(count)
        .map(|p| (*p).to_string())
        .collect()
}
