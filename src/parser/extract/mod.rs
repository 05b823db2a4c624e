pub mod description;
pub mod header;
pub mod images;
pub mod literature;
pub mod location;
pub mod sidebar;
pub mod tables;

use scraper::Html;

use super::labels::{Block, SidebarList};
use super::sections;
use crate::record::Record;

/// Fill every field of a Record whose title is already known.
pub fn extract_all(source_id: u32, name: String, doc: &Html, base_url: &str) -> Record {
    let mut record = Record {
        source_id,
        name,
        alternate_names: header::alternate_names(doc),
        kind: header::kind(doc),
        ..Default::default()
    };

    for (block, el) in sections::main_blocks(doc) {
        match block {
            Block::Location => location::extract(el, &mut record.location),
            Block::Owners => record.owners.extend(tables::owners(el)),
            Block::History => record.history.extend(tables::history(el)),
            Block::Dimensions => record.dimensions.extend(tables::dimensions(el)),
            Block::Description => {
                let (description, preserved) = description::extract(el);
                if description.is_some() {
                    record.description = description;
                }
                if preserved.is_some() {
                    record.preserved_state = preserved;
                }
            }
        }
    }

    for (list, el) in sections::sidebar_lists(doc) {
        match list {
            SidebarList::Utilization => record.utilization.extend(sidebar::items(el)),
            SidebarList::ExternalLinks => record.external_links.extend(sidebar::links(el)),
        }
    }

    record.literature = literature::extract(doc);
    record.images = images::extract(doc, base_url);
    images::apply_captions(doc, &mut record.images);

    record
}
