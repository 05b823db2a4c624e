use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::parser::sections::{parent_element, text_of};

static BOOK_ICON_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".icon-book").unwrap());

/// Each book icon sits inside its citation.
pub fn extract(doc: &Html) -> Vec<String> {
    doc.select(&BOOK_ICON_SEL)
        .filter_map(parent_element)
        .map(|el| text_of(el).trim().to_string())
        .collect()
}
