use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::parser::sections::select_text;
use crate::record::{HistoryEntry, Owner};

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// (header cell, value cell) text of every row, trimmed.
fn row_pairs(block: ElementRef<'_>) -> impl Iterator<Item = (String, String)> + '_ {
    block.select(&TR_SEL).map(|row| {
        (
            select_text(row, &TH_SEL).trim().to_string(),
            select_text(row, &TD_SEL).trim().to_string(),
        )
    })
}

pub fn owners(block: ElementRef<'_>) -> Vec<Owner> {
    row_pairs(block)
        .map(|(name, date)| Owner { name, date })
        .collect()
}

pub fn history(block: ElementRef<'_>) -> Vec<HistoryEntry> {
    row_pairs(block)
        .map(|(date, description)| HistoryEntry { date, description })
        .collect()
}

pub fn dimensions(block: ElementRef<'_>) -> Vec<String> {
    row_pairs(block).map(|(_, value)| value).collect()
}
