use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{PartsError, Result};

pub const PART_NUMBER: &str = "Part Number";
pub const PART_NAME: &str = "Part Name";
pub const QTY_MADE: &str = "Qty Made";
pub const DRAWING: &str = "Drawing (PDF)/DXF";

/// The three status properties a part carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Design,
    Po,
    Mfg,
}

impl StatusField {
    pub const ALL: [StatusField; 3] = [StatusField::Design, StatusField::Po, StatusField::Mfg];

    /// Property name in the data source.
    pub fn property(&self) -> &'static str {
        match self {
            StatusField::Design => "Design Status",
            StatusField::Po => "PO Status",
            StatusField::Mfg => "Mfg Status",
        }
    }

    /// Human label, e.g. for select menus.
    pub fn label(&self) -> &'static str {
        match self {
            StatusField::Design => "Design status",
            StatusField::Po => "PO status",
            StatusField::Mfg => "Mfg status",
        }
    }

    /// Short stable key used in command choices and component ids.
    pub fn key(&self) -> &'static str {
        match self {
            StatusField::Design => "design",
            StatusField::Po => "po",
            StatusField::Mfg => "mfg",
        }
    }
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.property())
    }
}

impl std::str::FromStr for StatusField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "design" | "design status" => Ok(StatusField::Design),
            "po" | "po status" => Ok(StatusField::Po),
            "mfg" | "mfg status" => Ok(StatusField::Mfg),
            other => Err(format!("unknown status field: {other}")),
        }
    }
}

// --- raw Notion JSON (deserialization only) ---------------------------------

#[derive(Debug, Clone, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedValue {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UrlValue {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FileObject {
    name: String,
    file: Option<UrlValue>,
    external: Option<UrlValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title { title: Vec<RichText> },
    RichText { rich_text: Vec<RichText> },
    Status { status: Option<NamedValue> },
    Select { select: Option<NamedValue> },
    Number { number: Option<f64> },
    Files { files: Vec<FileObject> },
    #[serde(other)]
    Other,
}

impl PropertyValue {
    fn plain_text(&self) -> Option<String> {
        match self {
            PropertyValue::Title { title: parts } | PropertyValue::RichText { rich_text: parts } => {
                Some(parts.iter().map(|p| p.plain_text.as_str()).collect())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    id: String,
    #[serde(default)]
    url: String,
    properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    results: Vec<serde_json::Value>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct StatusOptions {
    options: Vec<NamedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SchemaProperty {
    Status { status: StatusOptions },
    Select { select: StatusOptions },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawDataSource {
    properties: HashMap<String, SchemaProperty>,
}

// --- public types ------------------------------------------------------------

/// An attached drawing, downloadable while its URL is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingFile {
    pub name: String,
    pub url: String,
}

/// One page of the parts data source.
#[derive(Debug, Clone)]
pub struct Part {
    pub id: String,
    pub url: String,
    properties: HashMap<String, PropertyValue>,
}

impl Part {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawPage =
            serde_json::from_value(value).map_err(|e| PartsError::Parse(e.to_string()))?;
        Ok(Self {
            id: raw.id,
            url: raw.url,
            properties: raw.properties,
        })
    }

    /// Property lookup ignoring ASCII case, returning the stored name too.
    fn property(&self, name: &str) -> Option<(&str, &PropertyValue)> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), v))
    }

    fn text(&self, name: &str) -> String {
        self.property(name)
            .and_then(|(_, v)| v.plain_text())
            .unwrap_or_default()
    }

    pub fn part_number(&self) -> String {
        self.text(PART_NUMBER)
    }

    pub fn part_name(&self) -> String {
        self.text(PART_NAME)
    }

    /// `"<Part Number> - <Part Name>"`, or whichever half is present.
    pub fn title(&self) -> String {
        let number = self.part_number();
        let name = self.part_name();
        match (number.trim().is_empty(), name.trim().is_empty()) {
            (false, false) => format!("{} - {}", number.trim(), name.trim()),
            (false, true) => number.trim().to_string(),
            (true, false) => name.trim().to_string(),
            (true, true) => "Untitled part".to_string(),
        }
    }

    pub fn status(&self, field: StatusField) -> Option<&str> {
        match self.property(field.property())?.1 {
            PropertyValue::Status { status: Some(v) } | PropertyValue::Select { select: Some(v) } => {
                Some(v.name.as_str())
            }
            _ => None,
        }
    }

    /// Exact property name as stored, for update requests.
    pub fn property_name(&self, name: &str) -> Option<String> {
        self.property(name).map(|(k, _)| k.to_string())
    }

    pub fn qty_made(&self) -> Option<i64> {
        match self.property(QTY_MADE)?.1 {
            PropertyValue::Number { number } => number.map(|n| n.round() as i64),
            _ => None,
        }
    }

    /// First file of the drawing property, if any.
    pub fn drawing(&self) -> Option<DrawingFile> {
        match self.property(DRAWING)?.1 {
            PropertyValue::Files { files } => files.iter().find_map(|f| {
                let url = f.file.as_ref().or(f.external.as_ref())?;
                Some(DrawingFile {
                    name: f.name.clone(),
                    url: url.url.clone(),
                })
            }),
            _ => None,
        }
    }
}

/// Result of a part search.
#[derive(Debug, Clone)]
pub struct PartSearch {
    pub parts: Vec<Part>,
    /// More matches exist than were returned.
    pub truncated: bool,
}

impl PartSearch {
    pub(crate) fn from_json(value: serde_json::Value, max_results: usize) -> Result<Self> {
        let raw: RawQuery =
            serde_json::from_value(value).map_err(|e| PartsError::Parse(e.to_string()))?;
        let total = raw.results.len();
        let parts = raw
            .results
            .into_iter()
            .take(max_results)
            .map(Part::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            parts,
            truncated: raw.has_more || total > max_results,
        })
    }
}

/// Allowed options of each status property.
#[derive(Debug, Clone, Default)]
pub struct PartsSchema {
    options: HashMap<StatusField, Vec<String>>,
}

impl PartsSchema {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawDataSource =
            serde_json::from_value(value).map_err(|e| PartsError::Parse(e.to_string()))?;

        let mut options = HashMap::new();
        for field in StatusField::ALL {
            let found = raw
                .properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field.property()))
                .map(|(_, v)| v);
            let names = match found {
                Some(SchemaProperty::Status { status: o }) | Some(SchemaProperty::Select { select: o }) => {
                    o.options.iter().map(|n| n.name.clone()).collect()
                }
                _ => return Err(PartsError::MissingProperty(field.property().to_string())),
            };
            options.insert(field, names);
        }
        Ok(Self { options })
    }

    pub fn options(&self, field: StatusField) -> &[String] {
        self.options.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-insensitive match against the allowed options.
    pub fn resolve_option(&self, field: StatusField, option: &str) -> Result<String> {
        self.options(field)
            .iter()
            .find(|o| o.eq_ignore_ascii_case(option.trim()))
            .cloned()
            .ok_or_else(|| PartsError::UnknownOption {
                property: field.property().to_string(),
                option: option.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn page_json() -> serde_json::Value {
        json!({
            "object": "page",
            "id": "page-1",
            "url": "https://www.notion.so/page-1",
            "properties": {
                "Part Number": {"id": "a", "type": "rich_text", "rich_text": [{"plain_text": "BAJA-"}, {"plain_text": "0042"}]},
                "Part Name": {"id": "b", "type": "title", "title": [{"plain_text": "Front Upright"}]},
                "Design Status": {"id": "c", "type": "status", "status": {"id": "x", "name": "Released", "color": "green"}},
                "PO Status": {"id": "d", "type": "status", "status": null},
                "mfg status": {"id": "e", "type": "status", "status": {"name": "In Progress"}},
                "Qty Made": {"id": "f", "type": "number", "number": 3},
                "Drawing (PDF)/DXF": {"id": "g", "type": "files", "files": [
                    {"name": "upright.pdf", "type": "file", "file": {"url": "https://files/upright.pdf", "expiry_time": "2025-01-01T00:00:00.000Z"}}
                ]},
                "Owner": {"id": "h", "type": "people", "people": []}
            }
        })
    }

    #[test]
    fn page_properties_are_typed() {
        let part = Part::from_json(page_json()).unwrap();
        assert_eq!(part.title(), "BAJA-0042 - Front Upright");
        assert_eq!(part.status(StatusField::Design), Some("Released"));
        assert_eq!(part.status(StatusField::Po), None);
        assert_eq!(part.status(StatusField::Mfg), Some("In Progress"));
        assert_eq!(part.qty_made(), Some(3));
        assert_eq!(
            part.drawing(),
            Some(DrawingFile {
                name: "upright.pdf".to_string(),
                url: "https://files/upright.pdf".to_string(),
            })
        );
        assert_eq!(part.property_name("MFG STATUS").as_deref(), Some("mfg status"));
    }

    #[test]
    fn missing_properties_degrade_gracefully() {
        let part = Part::from_json(json!({"id": "p", "properties": {}})).unwrap();
        assert_eq!(part.title(), "Untitled part");
        assert_eq!(part.qty_made(), None);
        assert!(part.drawing().is_none());
    }

    #[test]
    fn search_truncates_to_max_results() {
        let results: Vec<_> = (0..7).map(|_| page_json()).collect();
        let search =
            PartSearch::from_json(json!({"results": results, "has_more": false}), 5).unwrap();
        assert_eq!(search.parts.len(), 5);
        assert!(search.truncated);

        let one = PartSearch::from_json(json!({"results": [page_json()], "has_more": false}), 5)
            .unwrap();
        assert!(!one.truncated);

        let more = PartSearch::from_json(json!({"results": [page_json()], "has_more": true}), 5)
            .unwrap();
        assert!(more.truncated);
    }

    fn schema_json() -> serde_json::Value {
        let status = |names: &[&str]| {
            json!({"type": "status", "status": {"options": names.iter().map(|n| json!({"name": n, "color": "gray"})).collect::<Vec<_>>(), "groups": []}})
        };
        json!({
            "object": "data_source",
            "id": "ds",
            "properties": {
                "Design Status": status(&["Not Started", "In Review", "Released"]),
                "PO Status": status(&["Not Ordered", "Ordered", "Received"]),
                "Mfg Status": status(&["Not Started", "In Progress", "Done"]),
                "Part Name": {"type": "title", "title": {}}
            }
        })
    }

    #[test]
    fn schema_lists_status_options() {
        let schema = PartsSchema::from_json(schema_json()).unwrap();
        assert_eq!(schema.options(StatusField::Po), ["Not Ordered", "Ordered", "Received"]);
        assert_eq!(schema.resolve_option(StatusField::Mfg, "done").unwrap(), "Done");
        assert!(matches!(
            schema.resolve_option(StatusField::Mfg, "Shipped"),
            Err(PartsError::UnknownOption { .. })
        ));
    }

    #[test]
    fn schema_without_status_property_is_an_error() {
        let err = PartsSchema::from_json(json!({"properties": {}})).unwrap_err();
        assert!(matches!(err, PartsError::MissingProperty(p) if p == "Design Status"));
    }

    #[test]
    fn status_field_parses_keys() {
        assert_eq!("PO".parse::<StatusField>().unwrap(), StatusField::Po);
        assert_eq!("Mfg Status".parse::<StatusField>().unwrap(), StatusField::Mfg);
        assert!("qty".parse::<StatusField>().is_err());
    }
}
