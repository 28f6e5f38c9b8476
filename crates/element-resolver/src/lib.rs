//! Element resolution with cascading selector plans and a scored
//! freeform fallback.
//!
//! Deterministic action categories (click, type, search, item selection,
//! add-to-collection) walk an ordered selector plan and accept the first
//! locator that becomes visible inside a bounded probe window; there is no
//! scoring across plan entries. Steps the classifier could not type are
//! resolved against a bounded page snapshot, optionally asking an external
//! suggester first and falling back to keyword scoring.

mod bridge;
mod errors;
mod plans;
mod resolver;
mod scoring;

pub use bridge::{Confidence, SelectorSuggester, SelectorSuggestion, SuggestError};
pub use errors::ResolveError;
pub use plans::{click_plan, collect_plan, item_plan, search_plan, type_plan};
pub use resolver::{
    infer_freeform_action, ElementResolver, FreeformAction, ResolvedElement, ResolverConfig,
};
pub use scoring::{best_candidate, build_selector, keywords, ScoredCandidate};
