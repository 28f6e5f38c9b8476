//! Step string -> typed action intent classification.
//!
//! Classification is pure, total and case-insensitive: an ordered rule
//! table is evaluated top to bottom and the first matching rule wins. No
//! scoring across rules; anything unmatched falls through to
//! [`ActionIntent::Unclassified`], which the orchestrator hands to the
//! freeform resolution path instead of failing outright.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

mod normalize;

pub use normalize::normalize_steps;

/// Default wait when a wait step carries no duration.
pub const DEFAULT_WAIT_MS: u64 = 2_000;

/// The classified, typed meaning of one natural-language step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionIntent {
    OpenBrowser,
    Navigate { url: String },
    Click { target: String },
    TypeText { target: String, value: String },
    Search { query: String },
    SelectItem { ordinal: usize },
    AddToCollection,
    Wait { duration_ms: u64 },
    Scroll,
    PressKey { key: String },
    Unclassified { raw: String },
}

static OPEN_BROWSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:open|launch)\s+(?:the\s+)?browser\b").unwrap());
static NAVIGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:navigate\s+to|go\s+to|open)\s+["']?([^"'\n]+?)["']?\s*$"#).unwrap()
});
static SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\bsearch\s+(?:for\s+)?(?:the\s+)?(?:product\s+)?(?:called\s+)?["']?([^"'\n]+?)["']?\s*$"#,
    )
    .unwrap()
});
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:st|nd|rd|th)\b").unwrap());
static CLICK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bclick\s+(?:on\s+)?(?:the\s+)?["']?([^"'\n]+?)["']?\s*$"#).unwrap()
});
static TYPE_WITH_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:type|enter|fill)\s+["']?([^"']+?)["']?\s+(?:in|into)\s+(?:the\s+)?["']?([^"'\n]+?)["']?\s*$"#,
    )
    .unwrap()
});
static TYPE_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:type|enter|fill)\s+["']?([^"'\n]+?)["']?\s*$"#).unwrap());
static WAIT_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:seconds?|s)\b").unwrap());
static PRESS_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\bpress\s+["']?(\w+)"#).unwrap());

/// Classify one step description. Rule priority is the contract: a step
/// matching several patterns resolves via the earliest rule.
pub fn classify(text: &str) -> ActionIntent {
    let step = text.to_lowercase();

    if OPEN_BROWSER.is_match(&step) {
        return ActionIntent::OpenBrowser;
    }

    if step.contains("navigate to") || step.contains("go to") || step.contains("open ") {
        if let Some(caps) = NAVIGATE.captures(text) {
            return ActionIntent::Navigate {
                url: caps[1].trim().to_string(),
            };
        }
    }

    if step.contains("search") {
        if let Some(caps) = SEARCH.captures(text) {
            return ActionIntent::Search {
                query: caps[1].trim().to_string(),
            };
        }
    }

    if step.contains("select") && step.contains("product") {
        return ActionIntent::SelectItem {
            ordinal: parse_ordinal(&step),
        };
    }

    if step.contains("add") && step.contains("cart") {
        return ActionIntent::AddToCollection;
    }

    if step.contains("click") {
        if let Some(caps) = CLICK.captures(text) {
            return ActionIntent::Click {
                target: caps[1].trim().to_string(),
            };
        }
    }

    if step.contains("type") || step.contains("enter") || step.contains("fill") {
        if let Some(caps) = TYPE_WITH_TARGET.captures(text) {
            return ActionIntent::TypeText {
                value: caps[1].trim().to_string(),
                target: caps[2].trim().to_string(),
            };
        }
        if let Some(caps) = TYPE_VALUE.captures(text) {
            // No in/into clause: aim at a generic input field.
            return ActionIntent::TypeText {
                value: caps[1].trim().to_string(),
                target: "input".to_string(),
            };
        }
    }

    if step.contains("wait") {
        let duration_ms = WAIT_SECONDS
            .captures(&step)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1_000))
            .unwrap_or(DEFAULT_WAIT_MS);
        return ActionIntent::Wait { duration_ms };
    }

    if step.contains("scroll") {
        return ActionIntent::Scroll;
    }

    if let Some(caps) = PRESS_KEY.captures(text) {
        return ActionIntent::PressKey {
            key: caps[1].to_string(),
        };
    }

    ActionIntent::Unclassified {
        raw: text.to_string(),
    }
}

/// Parse a `2nd` / `3rd` style ordinal token; defaults to 1.
fn parse_ordinal(step: &str) -> usize {
    ORDINAL
        .captures(step)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}
