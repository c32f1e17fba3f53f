use serde::{Deserialize, Serialize};

/// Normalized, serializable description of a page element usable as an action target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

/// Ordered, size-bounded candidate list. Order only matters for truncation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementSnapshot {
    elements: Vec<CandidateElement>,
}

impl ElementSnapshot {
    pub fn new(elements: Vec<CandidateElement>) -> Self {
        Self { elements }
    }

    /// Builds a snapshot keeping at most `max` elements from the front.
    pub fn bounded(mut elements: Vec<CandidateElement>, max: usize) -> Self {
        elements.truncate(max);
        Self { elements }
    }

    pub fn elements(&self) -> &[CandidateElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The first `n` elements (fewer if the snapshot is smaller).
    pub fn head(&self, n: usize) -> &[CandidateElement] {
        &self.elements[..n.min(self.elements.len())]
    }

    /// Bounded digest used in cache keys: the first `len` characters of the
    /// JSON serialization.
    pub fn fingerprint(&self, len: usize) -> String {
        let json = serde_json::to_string(&self.elements).unwrap_or_default();
        json.chars().take(len).collect()
    }
}

/// Rendered box of an element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// 1-based position of an element among its parent's children with the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingPosition {
    pub index: usize,
    pub count: usize,
}

/// A live element as reported by a [`Page`](crate::perception::traits::Page).
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    /// Page-scoped handle used by the action primitives.
    pub node_id: usize,
    pub tag: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub text: String,
    pub href: Option<String>,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    pub input_type: Option<String>,
    pub rect: Rect,
    pub siblings: Option<SiblingPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBlock {
    Start,
    Center,
    End,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOptions {
    pub behavior: ScrollBehavior,
    pub block: ScrollBlock,
}

impl ScrollOptions {
    pub const SMOOTH_CENTER: ScrollOptions = ScrollOptions {
        behavior: ScrollBehavior::Smooth,
        block: ScrollBlock::Center,
    };
}
