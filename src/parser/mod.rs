pub mod extract;
pub mod labels;
pub mod sections;

use scraper::Html;

use crate::record::Record;

/// Result of reading one detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(Record),
    /// The page has no primary title; the id holds no castle.
    Empty,
}

/// HTML → Record. Pure: the same input always yields the same output.
pub fn parse_page(source_id: u32, html: &str, base_url: &str) -> Extraction {
    let doc = Html::parse_document(html);
    match extract::header::title(&doc) {
        Some(name) => Extraction::Record(extract::extract_all(source_id, name, &doc, base_url)),
        None => Extraction::Empty,
    }
}
