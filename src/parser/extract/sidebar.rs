use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::parser::sections::text_of;
use crate::record::ExternalLink;

static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

pub fn items(list: ElementRef<'_>) -> Vec<String> {
    list.select(&LI_SEL)
        .map(|li| text_of(li).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One link per list item; items without an anchor are skipped.
pub fn links(list: ElementRef<'_>) -> Vec<ExternalLink> {
    list.select(&LI_SEL)
        .filter_map(|li| {
            let a = li.select(&A_SEL).next()?;
            Some(ExternalLink {
                text: text_of(a).trim().to_string(),
                url: a.value().attr("href").unwrap_or_default().to_string(),
            })
        })
        .collect()
}
