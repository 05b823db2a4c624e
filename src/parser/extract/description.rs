use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::parser::labels::{PRESERVED_DELIMITER, PRESERVED_KEYWORD};
use crate::parser::sections::{parent_element, text_of};

static DROPCAP_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".dropcap").unwrap());

/// The description paragraph is the parent of the drop-cap initial.
pub fn extract(block: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let text = block
        .select(&DROPCAP_SEL)
        .next()
        .and_then(parent_element)
        .map(text_of)
        .unwrap_or_default();
    split(&text)
}

/// Returns (description, preserved state).
pub fn split(text: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = text.split(PRESERVED_DELIMITER).collect();
    match parts.as_slice() {
        [description, preserved, ..] => (non_empty(description), non_empty(preserved)),
        [only] if only.contains(PRESERVED_KEYWORD) => {
            (None, non_empty(&only.replacen(PRESERVED_KEYWORD, "", 1)))
        }
        [only] => (non_empty(only), None),
        [] => (None, None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
