//! Canvas element model (Excalidraw-compatible) and board-wide default
//! styling.
//!
//! Elements keep the fields the engine reads or writes as typed members and
//! carry everything else through `extra`. An element read from JSON also
//! keeps the JSON it came from and is written back as that JSON until one of
//! its fields changes, so elements the engine does not manage come out
//! exactly as they went in.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::graph::{FillStyle, StrokeStyle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    Arrow,
    Line,
    Text,
    Other(String),
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "rectangle" => ElementKind::Rectangle,
            "ellipse" => ElementKind::Ellipse,
            "diamond" => ElementKind::Diamond,
            "arrow" => ElementKind::Arrow,
            "line" => ElementKind::Line,
            "text" => ElementKind::Text,
            _ => ElementKind::Other(s),
        }
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Rectangle => "rectangle".to_string(),
            ElementKind::Ellipse => "ellipse".to_string(),
            ElementKind::Diamond => "diamond".to_string(),
            ElementKind::Arrow => "arrow".to_string(),
            ElementKind::Line => "line".to_string(),
            ElementKind::Text => "text".to_string(),
            ElementKind::Other(s) => s,
        }
    }
}

impl ElementKind {
    /// Shapes that can hold a node label.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond
        )
    }
}

/// Segment tags stored in `customData.type`.
pub mod tags {
    pub const CLASS_CONTAINER: &str = "class-container";
    pub const CLASS_ATTRIBUTES: &str = "class-attributes";
    pub const CLASS_METHODS: &str = "class-methods";
    pub const CLASS_SEPARATOR: &str = "class-separator";
    pub const LIFELINE: &str = "lifeline";
    pub const SEQUENCE_MESSAGE: &str = "sequence-message";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomData {
    pub fn tagged(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub element_id: String,
    #[serde(default)]
    pub focus: f64,
    #[serde(default)]
    pub gap: f64,
}

impl Binding {
    pub fn to(element_id: &str) -> Self {
        Self {
            element_id: element_id.to_string(),
            focus: 0.0,
            gap: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roundness {
    #[serde(rename = "type")]
    pub kind: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Roundness type the canvas uses for adaptive corner radii.
pub const ADAPTIVE_ROUNDNESS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_nonce: Option<u64>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_elements: Option<Vec<BoundElement>>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roundness: Option<Roundness>,

    /// Points relative to `(x, y)`, for arrows and lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_arrowhead: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_arrowhead: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,

    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    source: Source,
}

/// JSON an element was read from. Not part of the element's value.
#[derive(Debug, Clone, Default)]
struct Source(Option<Box<Value>>);

impl PartialEq for Source {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.unchanged_source() {
            Some(source) => source.serialize(serializer),
            None => Element::serialize(self, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = Value::deserialize(deserializer)?;
        let mut element = Element::deserialize(&source).map_err(serde::de::Error::custom)?;
        element.source = Source(Some(Box::new(source)));
        Ok(element)
    }
}

impl Element {
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            stroke_color: None,
            background_color: None,
            fill_style: None,
            stroke_width: None,
            stroke_style: None,
            roughness: None,
            opacity: None,
            seed: None,
            version: None,
            version_nonce: None,
            is_deleted: false,
            group_ids: Vec::new(),
            bound_elements: None,
            locked: false,
            roundness: None,
            points: None,
            start_binding: None,
            end_binding: None,
            start_arrowhead: None,
            end_arrowhead: None,
            text: None,
            original_text: None,
            font_size: None,
            font_family: None,
            text_align: None,
            vertical_align: None,
            container_id: None,
            line_height: None,
            custom_data: None,
            extra: Map::new(),
            source: Source::default(),
        }
    }

    /// The JSON this element was read from, while it still describes the
    /// element field for field.
    fn unchanged_source(&self) -> Option<&Value> {
        let source = self.source.0.as_deref()?;
        Element::deserialize(source)
            .is_ok_and(|read| read == *self)
            .then_some(source)
    }

    pub fn tag(&self) -> Option<&str> {
        self.custom_data.as_ref()?.tag.as_deref()
    }

    /// Whether the element carries identity metadata written by the engine.
    pub fn carries_identity(&self) -> bool {
        let Some(custom) = &self.custom_data else {
            return false;
        };
        custom.node_id.is_some()
            || custom.edge_id.is_some()
            || custom.id.is_some()
            || matches!(
                custom.tag.as_deref(),
                Some(
                    tags::LIFELINE
                        | tags::SEQUENCE_MESSAGE
                        | tags::CLASS_CONTAINER
                        | tags::CLASS_ATTRIBUTES
                        | tags::CLASS_METHODS
                        | tags::CLASS_SEPARATOR
                )
            )
    }

    /// Text content, falling back to `originalText`.
    pub fn text_content(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.original_text.as_deref())
            .unwrap_or_default()
    }

    /// First and last points in absolute coordinates.
    pub fn endpoints(&self) -> ([f64; 2], [f64; 2]) {
        let points = self.points.as_deref().unwrap_or_default();
        let first = points.first().copied().unwrap_or([0.0, 0.0]);
        let last = points.last().copied().unwrap_or(first);
        (
            [self.x + first[0], self.y + first[1]],
            [self.x + last[0], self.y + last[1]],
        )
    }
}

/// Reads elements from a JSON array, or an object with an `elements` array.
/// Entries that are not elements are skipped.
pub fn elements_from_json(value: Value) -> Vec<Element> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("elements") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Element>(item) {
            Ok(el) => Some(el),
            Err(err) => {
                warn!(%err, "skipping unreadable element");
                None
            }
        })
        .collect()
}

/// Default styling for generated elements. [`BoardStyle::infer`] adapts it
/// to what is already on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardStyle {
    pub stroke_color: String,
    pub background_color: String,
    pub fill_style: FillStyle,
    pub stroke_width: f64,
    pub stroke_style: StrokeStyle,
    pub roughness: f64,
    pub opacity: f64,
    pub font_size: f64,
    pub font_family: u32,
}

impl Default for BoardStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#1e1e1e".to_string(),
            background_color: "transparent".to_string(),
            fill_style: FillStyle::Hachure,
            stroke_width: 2.0,
            stroke_style: StrokeStyle::Solid,
            roughness: 1.0,
            opacity: 100.0,
            font_size: 20.0,
            font_family: 1,
        }
    }
}

impl BoardStyle {
    /// Most common container styling among live elements, field by field.
    /// Fields no container sets keep their defaults.
    pub fn infer(elements: &[Element]) -> Self {
        let containers: Vec<&Element> = elements
            .iter()
            .filter(|el| !el.is_deleted && el.kind.is_container())
            .collect();
        let mut style = Self::default();
        if containers.is_empty() {
            return style;
        }

        if let Some(v) = most_common(containers.iter().filter_map(|c| c.stroke_color.clone())) {
            style.stroke_color = v;
        }
        if let Some(v) = most_common(containers.iter().filter_map(|c| c.background_color.clone())) {
            style.background_color = v;
        }
        if let Some(v) = most_common(
            containers
                .iter()
                .filter_map(|c| c.fill_style.as_deref().and_then(enum_from_name)),
        ) {
            style.fill_style = v;
        }
        if let Some(v) = most_common(containers.iter().filter_map(|c| c.stroke_width)) {
            style.stroke_width = v;
        }
        if let Some(v) = most_common(
            containers
                .iter()
                .filter_map(|c| c.stroke_style.as_deref().and_then(enum_from_name)),
        ) {
            style.stroke_style = v;
        }
        if let Some(v) = most_common(containers.iter().filter_map(|c| c.roughness)) {
            style.roughness = v;
        }
        if let Some(v) = most_common(containers.iter().filter_map(|c| c.opacity)) {
            style.opacity = v;
        }
        style
    }
}

/// First value with the highest count.
fn most_common<T: PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (value, n) in counts {
        if best.as_ref().is_none_or(|(_, b)| n > *b) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

/// Reads a serde-named enum (`"cross-hatch"`, `"dashed"`) from its canvas
/// spelling.
pub(crate) fn enum_from_name<T: DeserializeOwned>(name: &str) -> Option<T> {
    serde_json::from_value(Value::String(name.to_string())).ok()
}

/// Canvas spelling of a serde-named enum.
pub(crate) fn enum_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(parts: &[&str]) -> u64 {
    let mut hash = FNV_OFFSET;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Element id derived from a role (`node`, `text`, `arrow`, ...) and a
/// logical id. The same inputs always give the same id.
pub fn derived_id(role: &str, logical_id: &str) -> String {
    format!("{:016x}", fnv1a(&[role, logical_id]))
}

/// Rendering seed for an element id, in the canvas' 31-bit range.
pub fn derived_seed(element_id: &str, salt: &str) -> u64 {
    fnv1a(&[element_id, salt]) % 2_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": "abc",
            "type": "freedraw",
            "x": 10.0,
            "y": 20.0,
            "pressures": [0.5, 0.7],
            "simulatePressure": false
        });
        let el: Element = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(el.kind, ElementKind::Other("freedraw".to_string()));
        let back = serde_json::to_value(&el).unwrap();
        assert_eq!(back["pressures"], raw["pressures"]);
        assert_eq!(back["simulatePressure"], json!(false));
        assert_eq!(back["type"], json!("freedraw"));
    }

    #[test]
    fn unchanged_element_is_written_as_read() {
        let raw = r#"{"id":"free1","points":[[0,0],[1,1]],"type":"freedraw","x":3,"y":4}"#;
        let el: Element = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&el).unwrap(), raw);
        assert_eq!(serde_json::to_string(&el.clone()).unwrap(), raw);
    }

    #[test]
    fn edited_element_is_written_from_its_fields() {
        let mut el: Element =
            serde_json::from_str(r#"{"id":"r1","type":"rectangle","x":3,"y":4}"#).unwrap();
        el.x = 10.0;
        let back = serde_json::to_value(&el).unwrap();
        assert_eq!(back["x"], json!(10.0));
        assert_eq!(back["y"], json!(4.0));
        assert_eq!(back["locked"], json!(false));
    }

    #[test]
    fn custom_data_reads_camel_case() {
        let el: Element = serde_json::from_value(json!({
            "id": "r1",
            "type": "rectangle",
            "customData": { "nodeId": "A", "shape": "rounded", "owner": "me" }
        }))
        .unwrap();
        let custom = el.custom_data.as_ref().unwrap();
        assert_eq!(custom.node_id.as_deref(), Some("A"));
        assert_eq!(custom.extra["owner"], json!("me"));
        assert!(el.carries_identity());
    }

    #[test]
    fn elements_from_json_accepts_wrapped_scene() {
        let els = elements_from_json(json!({
            "type": "excalidraw",
            "elements": [
                { "id": "a", "type": "rectangle" },
                { "type": "rectangle" },
                { "id": "b", "type": "text", "text": "hi" }
            ]
        }));
        let ids: Vec<_> = els.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn infer_picks_most_common_container_style() {
        let mut a = Element::new("a", ElementKind::Rectangle);
        a.stroke_color = Some("#ff0000".to_string());
        a.fill_style = Some("solid".to_string());
        let mut b = a.clone();
        b.id = "b".to_string();
        let mut c = Element::new("c", ElementKind::Ellipse);
        c.stroke_color = Some("#00ff00".to_string());
        let mut arrow = Element::new("d", ElementKind::Arrow);
        arrow.stroke_color = Some("#0000ff".to_string());

        let style = BoardStyle::infer(&[a, b, c, arrow]);
        assert_eq!(style.stroke_color, "#ff0000");
        assert_eq!(style.fill_style, FillStyle::Solid);
        assert_eq!(style.stroke_width, 2.0);
    }

    #[test]
    fn infer_without_containers_is_default() {
        assert_eq!(BoardStyle::infer(&[]), BoardStyle::default());
    }

    #[test]
    fn derived_ids_are_stable_and_distinct() {
        assert_eq!(derived_id("node", "A"), derived_id("node", "A"));
        assert_ne!(derived_id("node", "A"), derived_id("text", "A"));
        assert_ne!(derived_id("node", "AB"), derived_id("node", "A"));
        assert_eq!(derived_id("node", "A").len(), 16);
    }

    #[test]
    fn enum_names_use_canvas_spelling() {
        assert_eq!(enum_name(&FillStyle::CrossHatch), "cross-hatch");
        assert_eq!(enum_from_name::<StrokeStyle>("dashed"), Some(StrokeStyle::Dashed));
        assert_eq!(enum_from_name::<StrokeStyle>("wavy"), None);
    }
}
