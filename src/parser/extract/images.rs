use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::parser::labels::CAPTION_PATTERN;
use crate::parser::sections::{next_element, parent_element};
use crate::record::Image;

static THUMBS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".masonry-thumbs").unwrap());
static THUMB_IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".masonry-thumbs img").unwrap());
static CAPTION_ITEM_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul li").unwrap());
static CAPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(CAPTION_PATTERN).unwrap());

/// Thumbnail `src` values start with "./" (or "..") relative to the site root.
const RELATIVE_PREFIX_LEN: usize = 2;

/// Lazy-loaded thumbnails carry their path in one of these instead of `src`.
const SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];

/// Thumbnails in document order; this order is the caption index space.
/// Every thumbnail yields one image, so a thumbnail without any source keeps
/// its position with an empty `source_url`.
pub fn extract(doc: &Html, base_url: &str) -> Vec<Image> {
    doc.select(&THUMB_IMG_SEL)
        .map(|img| {
            let src = SOURCE_ATTRS
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .map(str::trim)
                .find(|src| !src.is_empty());
            match src {
                Some(src) => {
                    let path: String = src.chars().skip(RELATIVE_PREFIX_LEN).collect();
                    Image::new(format!("{}{}", base_url, path))
                }
                None => {
                    debug!("Thumbnail without a source attribute");
                    Image::new(String::new())
                }
            }
        })
        .collect()
}

/// Assign `Bild <N>:` captions from the list following the gallery to `images[N-1]`.
pub fn apply_captions(doc: &Html, images: &mut [Image]) {
    let Some(captions) = doc
        .select(&THUMBS_SEL)
        .next()
        .and_then(parent_element)
        .and_then(next_element)
    else {
        return;
    };

    for item in captions.select(&CAPTION_ITEM_SEL) {
        for fragment in split_line_breaks(&item.inner_html()) {
            apply_fragment(fragment, images);
        }
    }
}

fn apply_fragment(fragment: &str, images: &mut [Image]) {
    let text = plain_text(fragment);
    let Some(caps) = CAPTION_RE.captures(&text) else {
        return;
    };
    let Some(position) = caps[1].parse::<usize>().ok().filter(|n| *n >= 1) else {
        return;
    };
    let copyright = CAPTION_RE.replace(&text, "").trim().to_string();

    match images.get_mut(position - 1) {
        Some(image) => image.copyright = Some(copyright),
        None => debug!(
            "Caption for image {} but page has {} images",
            position,
            images.len()
        ),
    }
}

/// Markup fragment to text: entities decoded, tags dropped, no-break spaces as spaces.
fn plain_text(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    html.root_element()
        .text()
        .collect::<String>()
        .replace('\u{a0}', " ")
}

/// Split serialized markup on `<br>` in any of its spellings.
fn split_line_breaks(html: &str) -> impl Iterator<Item = &str> {
    static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    BR_RE.split(html)
}
