//! Keyword scoring over a bounded page snapshot for freeform steps.

use browser_port::{ElementSummary, PageSnapshot};

const KEYWORD_POINTS: u32 = 10;
const CATEGORY_BONUS: u32 = 5;
const TYPE_HINT_BONUS: u32 = 3;

#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    /// Index of the winning element in the snapshot (ties break to the
    /// earliest index).
    pub index: usize,
    pub score: u32,
    pub selector: String,
}

/// Words worth matching on: everything longer than two characters.
pub fn keywords(action_text: &str) -> Vec<String> {
    action_text
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .collect()
}

/// Score every snapshot element against the step text and return the best
/// candidate, or `None` when every element scores zero.
pub fn best_candidate(snapshot: &PageSnapshot, action_text: &str) -> Option<ScoredCandidate> {
    let action = action_text.to_lowercase();
    let words = keywords(action_text);

    let mut best: Option<(usize, u32)> = None;
    for (index, element) in snapshot.elements.iter().enumerate() {
        let score = score_element(element, &action, &words);
        // Strict greater-than keeps the earliest element on ties.
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((index, score));
        }
    }

    best.and_then(|(index, score)| {
        build_selector(&snapshot.elements[index]).map(|selector| ScoredCandidate {
            index,
            score,
            selector,
        })
    })
}

fn score_element(element: &ElementSummary, action: &str, words: &[String]) -> u32 {
    let haystack = [
        element.text.as_deref(),
        element.placeholder.as_deref(),
        element.aria_label.as_deref(),
        element.name.as_deref(),
        element.id.as_deref(),
        element.classes.as_deref(),
    ]
    .iter()
    .flatten()
    .map(|s| s.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ");

    let mut score = 0;
    for word in words {
        if haystack.contains(word.as_str()) {
            score += KEYWORD_POINTS;
        }
    }

    let input_type = element.input_type.as_deref().unwrap_or("");

    if action.contains("click") || action.contains("button") || action.contains("submit") {
        if element.tag == "button" {
            score += CATEGORY_BONUS;
        }
        if input_type == "submit" {
            score += CATEGORY_BONUS;
        }
    }
    if action.contains("type")
        || action.contains("enter")
        || action.contains("input")
        || action.contains("search")
    {
        if element.tag == "input" || element.tag == "textarea" {
            score += CATEGORY_BONUS;
        }
        if input_type == "text" || input_type == "search" {
            score += TYPE_HINT_BONUS;
        }
    }
    if (action.contains("link") || action.contains("navigate")) && element.tag == "a" {
        score += CATEGORY_BONUS;
    }

    score
}

/// Build a selector for a snapshot element with the attribute priority
/// id > name > placeholder > aria-label > visible text.
pub fn build_selector(element: &ElementSummary) -> Option<String> {
    if let Some(id) = non_empty(&element.id) {
        return Some(format!("#{id}"));
    }
    if let Some(name) = non_empty(&element.name) {
        return Some(format!("[name=\"{name}\"]"));
    }
    if let Some(placeholder) = non_empty(&element.placeholder) {
        return Some(format!("[placeholder=\"{placeholder}\"]"));
    }
    if let Some(aria) = non_empty(&element.aria_label) {
        return Some(format!("[aria-label=\"{aria}\"]"));
    }
    if let Some(text) = non_empty(&element.text) {
        let clipped: String = text.chars().take(50).collect();
        return Some(format!("text=\"{clipped}\""));
    }
    None
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
