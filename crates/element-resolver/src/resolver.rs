//! "First visible wins" resolution over the category plans, plus the
//! freeform path for unclassified steps.

use std::sync::Arc;
use std::time::Duration;

use browser_port::{LocatorPort, PagePort, PageSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::SelectorSuggester;
use crate::errors::ResolveError;
use crate::plans;
use crate::scoring;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Visibility probe window per plan entry.
    pub probe_timeout_ms: u64,
    /// Upper bound on snapshot size for freeform resolution.
    pub snapshot_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2_000,
            snapshot_limit: 50,
        }
    }
}

/// A resolved element together with the selector that produced it.
pub struct ResolvedElement {
    pub locator: Arc<dyn LocatorPort>,
    pub selector: String,
}

impl std::fmt::Debug for ResolvedElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedElement")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// Gesture the orchestrator should apply to a freeform-resolved element,
/// inferred from the step verbs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FreeformAction {
    Click,
    Fill { value: String },
    SearchSubmit { query: String },
}

pub struct ElementResolver {
    config: ResolverConfig,
    suggester: Option<Arc<dyn SelectorSuggester>>,
}

impl ElementResolver {
    pub fn new(config: ResolverConfig, suggester: Option<Arc<dyn SelectorSuggester>>) -> Self {
        Self { config, suggester }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.config.probe_timeout_ms)
    }

    /// Walk a plan in order and return the first entry whose locator is
    /// visible inside the probe window.
    async fn first_visible(
        &self,
        page: &Arc<dyn PagePort>,
        plan: &[String],
    ) -> Option<ResolvedElement> {
        for selector in plan {
            let locator = Arc::clone(page).locate(selector);
            if locator.is_visible(self.probe_timeout()).await {
                debug!(selector, "plan entry matched");
                return Some(ResolvedElement {
                    locator,
                    selector: selector.clone(),
                });
            }
        }
        None
    }

    pub async fn resolve_click(
        &self,
        page: &Arc<dyn PagePort>,
        target: &str,
    ) -> Result<ResolvedElement, ResolveError> {
        self.first_visible(page, &plans::click_plan(target))
            .await
            .ok_or_else(|| {
                ResolveError::ElementNotFound(format!("Could not find clickable element: {target}"))
            })
    }

    pub async fn resolve_input(
        &self,
        page: &Arc<dyn PagePort>,
        target: &str,
    ) -> Result<ResolvedElement, ResolveError> {
        self.first_visible(page, &plans::type_plan(target))
            .await
            .ok_or_else(|| {
                ResolveError::ElementNotFound(format!("Could not find input field: {target}"))
            })
    }

    pub async fn resolve_search(
        &self,
        page: &Arc<dyn PagePort>,
    ) -> Result<ResolvedElement, ResolveError> {
        self.first_visible(page, &plans::search_plan())
            .await
            .ok_or_else(|| ResolveError::ElementNotFound("Could not find search input".into()))
    }

    /// Resolve the `ordinal`-th (1-based) visible item: the first plan
    /// entry yielding at least `ordinal` visible matches wins, and the
    /// match at index `ordinal - 1` in DOM order is returned.
    pub async fn resolve_item(
        &self,
        page: &Arc<dyn PagePort>,
        ordinal: usize,
    ) -> Result<ResolvedElement, ResolveError> {
        let ordinal = ordinal.max(1);
        let mut plan = plans::item_plan();
        plan.extend(plans::item_fallback_plans());

        for selector in &plan {
            let locator = Arc::clone(page).locate(selector);
            let matches = locator.visible_matches(ordinal).await?;
            if matches.len() >= ordinal {
                debug!(selector, ordinal, "item plan entry matched");
                return Ok(ResolvedElement {
                    locator: Arc::clone(&matches[ordinal - 1]),
                    selector: selector.clone(),
                });
            }
        }

        Err(ResolveError::ElementNotFound(format!(
            "Could not select product at index {ordinal}"
        )))
    }

    pub async fn resolve_collect(
        &self,
        page: &Arc<dyn PagePort>,
    ) -> Result<ResolvedElement, ResolveError> {
        self.first_visible(page, &plans::collect_plan())
            .await
            .ok_or_else(|| {
                ResolveError::ElementNotFound("Could not find Add to Cart button".into())
            })
    }

    /// Freeform resolution for steps the classifier could not type: ask
    /// the suggester first when present, then fall back to keyword
    /// scoring over a bounded snapshot.
    pub async fn resolve_freeform(
        &self,
        page: &Arc<dyn PagePort>,
        step_text: &str,
    ) -> Result<ResolvedElement, ResolveError> {
        let snapshot = page.snapshot(self.config.snapshot_limit).await?;

        if let Some(suggester) = &self.suggester {
            match suggester.suggest_selector(&snapshot, step_text).await {
                Ok(suggestion) if !suggestion.selector.trim().is_empty() => {
                    let locator = Arc::clone(page).locate(&suggestion.selector);
                    if locator.is_visible(self.probe_timeout()).await {
                        info!(
                            selector = %suggestion.selector,
                            confidence = ?suggestion.confidence,
                            "using suggested selector"
                        );
                        return Ok(ResolvedElement {
                            locator,
                            selector: suggestion.selector,
                        });
                    }
                    debug!(
                        selector = %suggestion.selector,
                        "suggested selector not visible, falling back to scoring"
                    );
                }
                Ok(_) => debug!("suggester returned an empty selector"),
                Err(err) => warn!("selector suggestion failed: {err}"),
            }
        }

        self.resolve_scored(page, &snapshot, step_text).await
    }

    async fn resolve_scored(
        &self,
        page: &Arc<dyn PagePort>,
        snapshot: &PageSnapshot,
        step_text: &str,
    ) -> Result<ResolvedElement, ResolveError> {
        let candidate = scoring::best_candidate(snapshot, step_text).ok_or_else(|| {
            ResolveError::ElementNotFound(format!("Could not find element for: {step_text}"))
        })?;

        debug!(
            selector = %candidate.selector,
            score = candidate.score,
            "scored fallback candidate"
        );

        let locator = Arc::clone(page).locate(&candidate.selector);
        if locator.is_visible(self.probe_timeout()).await {
            Ok(ResolvedElement {
                locator,
                selector: candidate.selector,
            })
        } else {
            Err(ResolveError::ElementNotFound(format!(
                "Could not find element for: {step_text}"
            )))
        }
    }
}

/// Infer the gesture for a freeform step from its verbs, mirroring how a
/// human phrases the instruction.
pub fn infer_freeform_action(step_text: &str) -> FreeformAction {
    let step = step_text.to_lowercase();

    if step.contains("type")
        || step.contains("enter")
        || step.contains("input")
        || step.contains("fill")
        || step.contains("write")
    {
        if let Some(value) = extract_quoted_or_trailing(&step, &["type", "enter", "input", "fill", "write"]) {
            return FreeformAction::Fill { value };
        }
    }

    if step.contains("search") {
        if let Some(query) = extract_quoted_or_trailing(&step, &["search for", "search"]) {
            return FreeformAction::SearchSubmit { query };
        }
    }

    FreeformAction::Click
}

fn extract_quoted_or_trailing(step: &str, verbs: &[&str]) -> Option<String> {
    // Prefer a quoted payload anywhere in the step.
    if let Some(start) = step.find('"') {
        if let Some(end) = step[start + 1..].find('"') {
            let value = step[start + 1..start + 1 + end].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    for verb in verbs {
        if let Some(pos) = step.find(verb) {
            let rest = step[pos + verb.len()..].trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Confidence, SelectorSuggestion, SuggestError};
    use async_trait::async_trait;
    use browser_port::fake::{ScriptedPage, SnapshotBuilder};
    use browser_port::ElementSummary;

    fn resolver() -> ElementResolver {
        let config = ResolverConfig {
            probe_timeout_ms: 10,
            ..ResolverConfig::default()
        };
        ElementResolver::new(config, None)
    }

    fn as_page(page: &Arc<ScriptedPage>) -> Arc<dyn PagePort> {
        Arc::clone(page) as Arc<dyn PagePort>
    }

    #[tokio::test]
    async fn click_cascade_takes_the_earliest_matching_strategy() {
        let scripted = ScriptedPage::new();
        // Both the exact-text and the button strategies would match; the
        // exact-text entry is earlier in the plan and must win.
        scripted.add_target("text=\"Login\"", 1);
        scripted.add_target("button:has-text(\"Login\")", 1);

        let page = as_page(&scripted);
        let resolved = resolver().resolve_click(&page, "Login").await.unwrap();
        assert_eq!(resolved.selector, "text=\"Login\"");

        resolved.locator.click().await.unwrap();
        assert_eq!(scripted.actions(), vec!["click text=\"Login\""]);
    }

    #[tokio::test]
    async fn click_falls_through_to_attribute_strategies() {
        let scripted = ScriptedPage::new();
        scripted.add_target("[aria-label*=\"menu\" i]", 1);

        let page = as_page(&scripted);
        let resolved = resolver().resolve_click(&page, "menu").await.unwrap();
        assert_eq!(resolved.selector, "[aria-label*=\"menu\" i]");
    }

    #[tokio::test]
    async fn click_exhaustion_names_the_target() {
        let scripted = ScriptedPage::new();
        let page = as_page(&scripted);
        let err = resolver()
            .resolve_click(&page, "Nonexistent Button")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ElementNotFound(_)));
        assert!(err.to_string().contains("Nonexistent Button"));
    }

    #[tokio::test]
    async fn search_uses_fixed_conventions_in_order() {
        let scripted = ScriptedPage::new();
        scripted.add_target("input[name=\"q\"]", 1);
        scripted.add_target("input[type=\"text\"]", 1);

        let page = as_page(&scripted);
        let resolved = resolver().resolve_search(&page).await.unwrap();
        assert_eq!(resolved.selector, "input[name=\"q\"]");
    }

    #[tokio::test]
    async fn item_resolution_picks_the_ordinal_match_in_dom_order() {
        let scripted = ScriptedPage::new();
        scripted.add_target(".product-card", 5);

        let page = as_page(&scripted);
        let resolved = resolver().resolve_item(&page, 2).await.unwrap();
        resolved.locator.click().await.unwrap();
        assert_eq!(scripted.actions(), vec!["click .product-card[1]"]);
    }

    #[tokio::test]
    async fn item_resolution_requires_enough_visible_matches() {
        let scripted = ScriptedPage::new();
        scripted.add_target(".product-card", 1);

        let page = as_page(&scripted);
        let err = resolver().resolve_item(&page, 3).await.unwrap_err();
        assert!(err.to_string().contains("index 3"));
    }

    struct FixedSuggester(Result<SelectorSuggestion, SuggestError>);

    #[async_trait]
    impl SelectorSuggester for FixedSuggester {
        async fn suggest_selector(
            &self,
            _page: &PageSnapshot,
            _action_text: &str,
        ) -> Result<SelectorSuggestion, SuggestError> {
            self.0.clone()
        }
    }

    fn checkout_snapshot() -> browser_port::PageSnapshot {
        SnapshotBuilder::new("https://shop.test", "Shop")
            .element(ElementSummary {
                tag: "button".into(),
                id: Some("place-order".into()),
                text: Some("Place order".into()),
                ..ElementSummary::default()
            })
            .build()
    }

    #[tokio::test]
    async fn freeform_prefers_the_suggested_selector() {
        let scripted = ScriptedPage::new();
        scripted.set_snapshot(checkout_snapshot());
        scripted.add_target("#confirm", 1);
        scripted.add_target("#place-order", 1);

        let suggester = Arc::new(FixedSuggester(Ok(SelectorSuggestion {
            selector: "#confirm".into(),
            confidence: Confidence::High,
        })));
        let resolver = ElementResolver::new(
            ResolverConfig {
                probe_timeout_ms: 10,
                ..ResolverConfig::default()
            },
            Some(suggester),
        );

        let page = as_page(&scripted);
        let resolved = resolver
            .resolve_freeform(&page, "confirm the order")
            .await
            .unwrap();
        assert_eq!(resolved.selector, "#confirm");
    }

    #[tokio::test]
    async fn freeform_falls_back_to_scoring_when_suggester_fails() {
        let scripted = ScriptedPage::new();
        scripted.set_snapshot(checkout_snapshot());
        scripted.add_target("#place-order", 1);

        let suggester = Arc::new(FixedSuggester(Err(SuggestError::Failed(
            "service offline".into(),
        ))));
        let resolver = ElementResolver::new(
            ResolverConfig {
                probe_timeout_ms: 10,
                ..ResolverConfig::default()
            },
            Some(suggester),
        );

        let page = as_page(&scripted);
        let resolved = resolver
            .resolve_freeform(&page, "place the order")
            .await
            .unwrap();
        assert_eq!(resolved.selector, "#place-order");
    }

    #[tokio::test]
    async fn freeform_without_suggester_uses_scoring() {
        let scripted = ScriptedPage::new();
        scripted.set_snapshot(checkout_snapshot());
        scripted.add_target("#place-order", 1);

        let page = as_page(&scripted);
        let resolved = resolver()
            .resolve_freeform(&page, "place the order")
            .await
            .unwrap();
        assert_eq!(resolved.selector, "#place-order");
    }

    #[tokio::test]
    async fn freeform_zero_scores_report_element_not_found() {
        let scripted = ScriptedPage::new();
        scripted.set_snapshot(checkout_snapshot());

        let page = as_page(&scripted);
        let err = resolver()
            .resolve_freeform(&page, "frobnicate the widget")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ElementNotFound(_)));
    }

    #[test]
    fn freeform_action_inference() {
        assert_eq!(
            infer_freeform_action("double-click the banner"),
            FreeformAction::Click
        );
        assert_eq!(
            infer_freeform_action("write \"hello\" in the comment box"),
            FreeformAction::Fill {
                value: "hello".into()
            }
        );
        assert_eq!(
            infer_freeform_action("search everywhere for deals"),
            FreeformAction::SearchSubmit {
                query: "everywhere for deals".into()
            }
        );
    }
}
