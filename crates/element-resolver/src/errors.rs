//! Error types for element resolution

use browser_port::BrowserError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    /// Every strategy in the plan was exhausted (or every snapshot
    /// candidate scored zero) without a usable element.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The page port failed underneath the resolver.
    #[error("browser error during resolution: {0}")]
    Browser(#[from] BrowserError),
}
