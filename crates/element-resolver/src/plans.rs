//! Ordered selector plans per action category.
//!
//! Plan order is the contract: earlier entries are more specific and win
//! over later ones. The lists encode the conventions arbitrary shop and
//! form pages actually follow; the final entry of the targeted plans is
//! the raw descriptor itself, so a step may always pass a literal
//! selector.

/// Click resolution: exact visible text, then buttons/links carrying the
/// text, partial text, then attribute conventions, then the raw
/// descriptor as a selector.
pub fn click_plan(target: &str) -> Vec<String> {
    vec![
        format!("text=\"{target}\""),
        format!("button:has-text(\"{target}\")"),
        format!("a:has-text(\"{target}\")"),
        format!("[role=\"button\"]:has-text(\"{target}\")"),
        format!("*:has-text(\"{target}\")"),
        format!("[aria-label=\"{target}\"]"),
        format!("[aria-label*=\"{target}\" i]"),
        format!("[title=\"{target}\"]"),
        format!("[title*=\"{target}\" i]"),
        format!("[placeholder=\"{target}\"]"),
        format!("[placeholder*=\"{target}\" i]"),
        format!("[name=\"{target}\"]"),
        format!("[name*=\"{target}\" i]"),
        format!("[id=\"{target}\"]"),
        format!("[id*=\"{target}\" i]"),
        format!("[class*=\"{target}\" i]"),
        format!("[data-testid*=\"{target}\" i]"),
        target.to_string(),
    ]
}

/// Text-entry resolution: descriptor-matching attributes first, then
/// label-adjacent inputs, then progressively generic text-like fields.
pub fn type_plan(target: &str) -> Vec<String> {
    vec![
        format!("input[placeholder*=\"{target}\" i]"),
        format!("textarea[placeholder*=\"{target}\" i]"),
        format!("input[name*=\"{target}\" i]"),
        format!("textarea[name*=\"{target}\" i]"),
        format!("input[aria-label*=\"{target}\" i]"),
        format!("textarea[aria-label*=\"{target}\" i]"),
        format!("input[id*=\"{target}\" i]"),
        format!("textarea[id*=\"{target}\" i]"),
        format!("label:has-text(\"{target}\") + input"),
        format!("label:has-text(\"{target}\") ~ input"),
        "input[type=\"text\"]".to_string(),
        "input[type=\"search\"]".to_string(),
        "input[type=\"email\"]".to_string(),
        "input[type=\"password\"]".to_string(),
        "input:not([type=\"hidden\"]):not([type=\"submit\"]):not([type=\"button\"])".to_string(),
        "textarea".to_string(),
        "[contenteditable=\"true\"]".to_string(),
        target.to_string(),
    ]
}

/// Search-box conventions, most explicit first. The trailing plain text
/// input is the last resort.
pub fn search_plan() -> Vec<String> {
    [
        "input[type=\"search\"]",
        "input[name=\"q\"]",
        "input[name=\"query\"]",
        "input[name=\"search\"]",
        "input[name=\"search_query\"]",
        "input[name=\"keyword\"]",
        "input[name=\"keywords\"]",
        "input[placeholder*=\"search\" i]",
        "input[placeholder*=\"find\" i]",
        "input[placeholder*=\"what are you looking\" i]",
        "input[aria-label*=\"search\" i]",
        "input[class*=\"search\" i]",
        "input[id*=\"search\" i]",
        "input[id*=\"query\" i]",
        "#search",
        "#searchInput",
        "#search-input",
        "#twotabsearchtextbox",
        ".search-input",
        ".searchInput",
        "[data-testid*=\"search\"]",
        "input[type=\"text\"]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Product-card conventions for result grids, from vendor-specific to
/// generic card shapes.
pub fn item_plan() -> Vec<String> {
    [
        "[data-component-type=\"s-search-result\"]",
        ".s-result-item[data-asin]",
        ".product-card",
        ".product-item",
        ".product-tile",
        ".product-box",
        "[class*=\"ProductCard\"]",
        "[class*=\"product-card\"]",
        "[class*=\"productCard\"]",
        "[data-id]",
        ".item-card",
        ".search-result",
        "[class*=\"result-item\"]",
        "[class*=\"search-result\"]",
        "[data-testid*=\"product\"]",
        "[data-testid*=\"item\"]",
        "article",
        ".card",
        "[class*=\"product\"]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fallback plans when no product card convention matched: anchors whose
/// href looks like a product link, then anything clickable with an image.
pub fn item_fallback_plans() -> Vec<String> {
    vec![
        "a[href*=\"product\"], a[href*=\"item\"], a[href*=\"/dp/\"], a[href*=\"/p/\"]".to_string(),
        "div[onclick], a:has(img)".to_string(),
    ]
}

/// Add-to-cart/bag/basket/buy button conventions: visible text first,
/// then id/class/data-attribute conventions.
pub fn collect_plan() -> Vec<String> {
    [
        "button:has-text(\"Add to Cart\")",
        "button:has-text(\"ADD TO CART\")",
        "button:has-text(\"Add to cart\")",
        "button:has-text(\"Add to Bag\")",
        "button:has-text(\"ADD TO BAG\")",
        "button:has-text(\"Add to basket\")",
        "button:has-text(\"ADD TO BASKET\")",
        "#add-to-cart-button",
        "input[name=\"submit.add-to-cart\"]",
        "#buy-now-button",
        "[id*=\"add-to-cart\"]",
        "[id*=\"addToCart\"]",
        "[class*=\"add-to-cart\"]",
        "[class*=\"addToCart\"]",
        "[class*=\"add_to_cart\"]",
        ".add-to-cart",
        ".addToCart",
        "button[data-testid*=\"cart\"]",
        "button[data-action*=\"cart\"]",
        "[data-button-action=\"add-to-cart\"]",
        "button:has-text(\"Buy Now\")",
        "button:has-text(\"BUY NOW\")",
        "button:has-text(\"Buy\")",
        "button[class*=\"add\"]",
        "button[class*=\"cart\"]",
        "input[type=\"submit\"][value*=\"cart\" i]",
        "input[type=\"submit\"][value*=\"add\" i]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
