use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::parser::labels::{self, LocationField};
use crate::parser::sections::{next_element, text_of};
use crate::record::Location;

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Walk the rows of the "Lage" table and fill `location` via the label table.
pub fn extract(block: ElementRef<'_>, location: &mut Location) {
    let rows: Vec<ElementRef<'_>> = block.select(&TR_SEL).collect();

    for (i, row) in rows.iter().enumerate() {
        let Some(label_cell) = row.select(&TD_SEL).next() else {
            continue;
        };
        let label = text_of(label_cell);
        let rules = labels::match_location(&label);
        if rules.is_empty() {
            continue;
        }

        let value = next_element(label_cell)
            .map(|cell| text_of(cell).trim().to_string())
            .unwrap_or_default();
        for rule in rules {
            assign(location, rule.field, value.clone());

            if rule.department_from_next_row {
                if let Some(dept) = rows.get(i + 1).and_then(|next| second_cell_text(*next)) {
                    location.department = Some(dept);
                }
            }
        }
    }
}

fn second_cell_text(row: ElementRef<'_>) -> Option<String> {
    let first = row.select(&TD_SEL).next()?;
    next_element(first).map(|cell| text_of(cell).trim().to_string())
}

fn assign(location: &mut Location, field: LocationField, value: String) {
    match field {
        LocationField::Country => location.country = Some(value),
        LocationField::State => location.state = Some(value),
        LocationField::Region => location.region = Some(value),
        LocationField::Department => location.department = Some(value),
        LocationField::City => location.city = Some(value),
        LocationField::Street => location.street = Some(value),
        LocationField::Coordinates => location.coordinates = parse_coordinates(&value),
    }
}

/// "49.0983°, 12.4861°" → ("49.0983", "12.4861").
pub fn parse_coordinates(text: &str) -> Option<(String, String)> {
    let cleaned = text.replace('°', "");
    let mut parts = cleaned.split(", ");
    let lat = parts.next()?.trim();
    let long = parts.next()?.trim();
    if parts.next().is_some() || lat.is_empty() || long.is_empty() {
        return None;
    }
    Some((lat.to_string(), long.to_string()))
}
