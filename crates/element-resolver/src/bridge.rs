//! Bridge to the optional AI selector-suggestion capability.
//!
//! The suggester is consulted before the scored fallback for freeform
//! steps. Absence or failure is never fatal; the resolver degrades to
//! keyword scoring.

use async_trait::async_trait;
use browser_port::PageSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorSuggestion {
    pub selector: String,
    pub confidence: Confidence,
}

#[derive(Debug, Error, Clone)]
pub enum SuggestError {
    #[error("suggester unavailable")]
    Unavailable,

    #[error("suggestion failed: {0}")]
    Failed(String),
}

/// External language-model capability: given a bounded page summary and
/// the raw step text, propose a selector.
#[async_trait]
pub trait SelectorSuggester: Send + Sync {
    async fn suggest_selector(
        &self,
        page: &PageSnapshot,
        action_text: &str,
    ) -> Result<SelectorSuggestion, SuggestError>;
}
