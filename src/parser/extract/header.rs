use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::parser::sections::{next_element, text_of};

static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

fn heading(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&H1_SEL).next()
}

/// The page's primary title; `None` when missing or blank.
pub fn title(doc: &Html) -> Option<String> {
    let text = text_of(heading(doc)?);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Comma-separated list in the element right after the title.
pub fn alternate_names(doc: &Html) -> Vec<String> {
    heading(doc)
        .and_then(next_element)
        .map(|el| {
            text_of(el)
                .split(", ")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Second element after the title names the castle type.
pub fn kind(doc: &Html) -> String {
    heading(doc)
        .and_then(next_element)
        .and_then(next_element)
        .map(|el| text_of(el).trim().to_string())
        .unwrap_or_default()
}
