use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::labels::{self, Block, SidebarList};

static MAIN_BLOCK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".panel, .table-responsive").unwrap());
static SIDEBAR_DIV_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sidebar div").unwrap());

/// How many preceding siblings may sit between a main block and its heading.
const MAIN_HEADING_REACH: usize = 2;
const SIDEBAR_HEADING_REACH: usize = 1;

/// Main-column blocks whose heading matches a known label, in document order.
pub fn main_blocks(doc: &Html) -> Vec<(Block, ElementRef<'_>)> {
    doc.select(&MAIN_BLOCK_SEL)
        .filter_map(|el| {
            let label = heading_label(el, MAIN_HEADING_REACH)?;
            labels::match_block(&label).map(|block| (block, el))
        })
        .collect()
}

/// Sidebar containers whose heading matches a known list label.
pub fn sidebar_lists(doc: &Html) -> Vec<(SidebarList, ElementRef<'_>)> {
    doc.select(&SIDEBAR_DIV_SEL)
        .filter_map(|el| {
            let label = heading_label(el, SIDEBAR_HEADING_REACH)?;
            labels::match_sidebar(&label).map(|list| (list, el))
        })
        .collect()
}

/// Text of the nearest `h4` among the `reach` previous sibling elements.
/// Only the first `h4` encountered counts.
fn heading_label(el: ElementRef<'_>, reach: usize) -> Option<String> {
    let mut current = el;
    for _ in 0..reach {
        current = prev_element(current)?;
        if current.value().name() == "h4" {
            return Some(text_of(current).trim().to_string());
        }
    }
    None
}

pub fn prev_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.prev_siblings().find_map(ElementRef::wrap)
}

pub fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Concatenated text of all descendants, untrimmed.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Concatenated text of every element matching `sel` under `el`.
pub fn select_text(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).map(text_of).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_found_one_or_two_siblings_back() {
        let doc = Html::parse_document(
            r#"<div>
                <h4>Lage</h4><div class="panel">a</div>
                <h4>Maße</h4><p>note</p><div class="table-responsive">b</div>
                <h4>Besitzer</h4><p>x</p><p>y</p><div class="panel">too far</div>
            </div>"#,
        );
        let found: Vec<Block> = main_blocks(&doc).into_iter().map(|(b, _)| b).collect();
        assert_eq!(found, vec![Block::Location, Block::Dimensions]);
    }

    #[test]
    fn unknown_heading_is_ignored() {
        let doc = Html::parse_document(r#"<h4>Anfahrt</h4><div class="panel">x</div>"#);
        assert!(main_blocks(&doc).is_empty());
    }

    #[test]
    fn sidebar_heading_must_be_adjacent() {
        let doc = Html::parse_document(
            r#"<aside class="sidebar">
                <h4>Nutzung</h4><div><ul><li>Museum</li></ul></div>
                <h4>Externe Links</h4><p>-</p><div><ul><li>x</li></ul></div>
            </aside>"#,
        );
        let found: Vec<SidebarList> = sidebar_lists(&doc).into_iter().map(|(l, _)| l).collect();
        assert_eq!(found, vec![SidebarList::Utilization]);
    }
}
