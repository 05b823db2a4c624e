//! Fixed German labels used by the alleburgen.de detail layout.
//!
//! All matching against these tables is case-sensitive.

/// Heading text (an `h4` right before the block) that names a main-column block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Location,
    Owners,
    History,
    Dimensions,
    Description,
}

pub const BLOCK_LABELS: &[(&str, Block)] = &[
    ("Lage", Block::Location),
    ("Besitzer", Block::Owners),
    ("Historie", Block::History),
    ("Maße", Block::Dimensions),
    ("Beschreibung", Block::Description),
];

/// Heading text that names a sidebar list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarList {
    Utilization,
    ExternalLinks,
}

pub const SIDEBAR_LABELS: &[(&str, SidebarList)] = &[
    ("Nutzung", SidebarList::Utilization),
    ("Externe Links", SidebarList::ExternalLinks),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationField {
    Country,
    State,
    Region,
    Department,
    City,
    Street,
    Coordinates,
}

/// One row rule of the "Lage" table: the first cell must contain `keyword`
/// and none of `unless`.
#[derive(Debug, Clone, Copy)]
pub struct LocationRule {
    pub keyword: &'static str,
    pub unless: &'static [&'static str],
    pub field: LocationField,
    /// Also read a department from the second cell of the following row.
    pub department_from_next_row: bool,
}

const fn rule(keyword: &'static str, field: LocationField) -> LocationRule {
    LocationRule {
        keyword,
        unless: &[],
        field,
        department_from_next_row: false,
    }
}

/// Evaluated in order. Longer keywords that contain a shorter one
/// ("Bundesland" / "Land") come first.
pub const LOCATION_RULES: &[LocationRule] = &[
    rule("Bundesland", LocationField::State),
    rule("Canton", LocationField::State),
    rule("Provinz", LocationField::State),
    rule("Arrondissement", LocationField::Region),
    // Also covers "Bezirksgemeinschaft".
    LocationRule {
        keyword: "Bezirk",
        unless: &[],
        field: LocationField::Region,
        department_from_next_row: true,
    },
    rule("Départment", LocationField::Department),
    rule("Koordinaten", LocationField::Coordinates),
    rule("Adresse", LocationField::Street),
    LocationRule {
        keyword: "Land",
        unless: &["Landkreis"],
        field: LocationField::Country,
        department_from_next_row: false,
    },
    rule("Ort", LocationField::City),
];

/// Every rule the row label satisfies, in table order. A rule whose keyword is
/// part of an already matched keyword ("Land" inside "Bundesland") is dropped.
pub fn match_location(label: &str) -> Vec<&'static LocationRule> {
    let mut matched: Vec<&'static LocationRule> = Vec::new();
    for rule in LOCATION_RULES {
        let applies =
            label.contains(rule.keyword) && !rule.unless.iter().any(|u| label.contains(u));
        if applies && !matched.iter().any(|m| m.keyword.contains(rule.keyword)) {
            matched.push(rule);
        }
    }
    matched
}

pub fn match_block(label: &str) -> Option<Block> {
    BLOCK_LABELS
        .iter()
        .find(|(text, _)| *text == label)
        .map(|(_, block)| *block)
}

pub fn match_sidebar(label: &str) -> Option<SidebarList> {
    SIDEBAR_LABELS
        .iter()
        .find(|(text, _)| *text == label)
        .map(|(_, list)| *list)
}

/// Splits the description text from the state of preservation.
pub const PRESERVED_DELIMITER: &str = "Erhalten: ";
pub const PRESERVED_KEYWORD: &str = "Erhalten:";

/// Caption fragments reference thumbnails as `Bild <N>:` (1-based).
pub const CAPTION_PATTERN: &str = r"Bild (\d+):";
