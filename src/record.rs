use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier handed out by a blob sink once an image is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub i64);

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One crawled castle page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub source_id: u32,
    pub name: String,
    pub alternate_names: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub dimensions: Vec<String>,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserved_state: Option<String>,
    pub owners: Vec<Owner>,
    pub history: Vec<HistoryEntry>,
    pub literature: Vec<String>,
    pub utilization: Vec<String>,
    pub external_links: Vec<ExternalLink>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    /// (latitude, longitude) as printed on the page, degree signs removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub text: String,
    pub url: String,
}

/// A thumbnail found on the page. Position in `Record::images` is the caption index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<BlobId>,
}

impl Image {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            copyright: None,
            blob_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_uses_camel_case_and_type_key() {
        let record = Record {
            source_id: 7,
            name: "Burg Eltz".into(),
            kind: "Höhenburg".into(),
            preserved_state: Some("vollständig".into()),
            images: vec![Image {
                source_url: "https://alleburgen.de/img/1.jpg".into(),
                copyright: None,
                blob_id: Some(BlobId(3)),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sourceId"], 7);
        assert_eq!(json["type"], "Höhenburg");
        assert_eq!(json["preservedState"], "vollständig");
        assert_eq!(json["images"][0]["blobId"], 3);
        assert!(json.get("description").is_none());
        assert!(json["images"][0].get("copyright").is_none());
    }
}
