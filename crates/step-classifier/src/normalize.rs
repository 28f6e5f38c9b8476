//! Canonicalisation of pasted step lists.
//!
//! Importers (ticket systems, free-text editors) hand over whole blocks of
//! text; this turns them into one clean step per line so the classifier
//! sees the same phrasing the rule table was written for.

use once_cell::sync::Lazy;
use regex::Regex;

static LIST_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());
static CONNECTIVE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:then|and|next)\s+").unwrap());
static OPEN_BROWSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:open|launch)\s+(?:the\s+)?browser").unwrap());
static NAVIGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(?:go\s+to|navigate\s+to|open)\s+["']?([^"'\n]+?)["']?\s*$"#).unwrap()
});
static SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^search\s+(?:for\s+)?(?:the\s+)?(?:product\s+)?(?:called\s+)?["']?([^"'\n]+?)["']?\s*$"#,
    )
    .unwrap()
});
static SELECT_PRODUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)select.*product").unwrap());
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:st|nd|rd|th)\b").unwrap());
static ADD_CART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)add.*cart").unwrap());

/// Split a pasted block of step text into canonical step strings.
pub fn normalize_steps(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| LIST_PREFIX.replace(line.trim(), "").into_owned())
        .filter(|line| !line.is_empty())
        .map(|line| canonicalize(&line))
        .collect()
}

fn canonicalize(line: &str) -> String {
    let cleaned = CONNECTIVE_PREFIX.replace(line, "").trim().to_string();

    if OPEN_BROWSER.is_match(&cleaned) {
        return "Open browser".to_string();
    }
    if let Some(caps) = NAVIGATE.captures(&cleaned) {
        return format!("Navigate to \"{}\"", caps[1].trim());
    }
    if let Some(caps) = SEARCH.captures(&cleaned) {
        return format!("Search for \"{}\"", caps[1].trim());
    }
    if SELECT_PRODUCT.is_match(&cleaned) {
        let ordinal = ORDINAL
            .captures(&cleaned)
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .unwrap_or(1);
        return format!("Select {}{} product", ordinal, ordinal_suffix(ordinal));
    }
    if ADD_CART.is_match(&cleaned) {
        return "Add the product to the cart".to_string();
    }

    cleaned
}

fn ordinal_suffix(n: usize) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
