//! Domain types shared by every twtsync crate.
//!
//! Upstream data stays loosely typed ([`UpstreamRecord`]); the website side is
//! the strongly-typed [`ContentItem`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw record as returned by the ticketing API: field name → loosely-typed value.
pub type UpstreamRecord = serde_json::Map<String, Value>;

/// Name of the upstream field carrying the external performance id.
pub const ID_FIELD: &str = "id";

/// Name of the upstream field carrying the on-sale flag.
pub const ONSALE_FIELD: &str = "onsale";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// External performance id in its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PerformanceId(pub String);

impl PerformanceId {
    /// Coerce a raw upstream id value to its canonical form.
    ///
    /// Strings are trimmed, integers are stringified. Blank strings, floats,
    /// booleans and nested values are not readable ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_owned()))
                }
            }
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Extract the id of an upstream record, if it has a readable one.
    pub fn from_record(record: &UpstreamRecord) -> Option<Self> {
        record.get(ID_FIELD).and_then(Self::from_value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PerformanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PerformanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PerformanceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Publication state of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    Published,
    #[default]
    Private,
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationState::Published => write!(f, "published"),
            PublicationState::Private => write!(f, "private"),
        }
    }
}

impl FromStr for PublicationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "published" => Ok(Self::Published),
            "private" => Ok(Self::Private),
            other => Err(format!(
                "unknown publication state '{other}'; expected: published, private"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Date range accessor
// ---------------------------------------------------------------------------

/// Start/end pair of a performance.
///
/// Invariant: when both bounds are set, `end >= start`. Moving one bound past
/// the other drags the other bound along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<NaiveDateTime>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let mut range = Self::default();
        if let Some(start) = start {
            range.set_start(start);
        }
        if let Some(end) = end {
            range.set_end(end);
        }
        range
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }

    pub fn set_start(&mut self, start: NaiveDateTime) {
        self.start = Some(start);
        if matches!(self.end, Some(end) if end < start) {
            self.end = Some(start);
        }
    }

    pub fn set_end(&mut self, end: NaiveDateTime) {
        self.end = Some(end);
        if matches!(self.start, Some(start) if start > end) {
            self.start = Some(end);
        }
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

// ---------------------------------------------------------------------------
// Content item
// ---------------------------------------------------------------------------

/// Website-side representation of a performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Reconciliation key. Never reset by a field sync.
    pub performance_id: PerformanceId,
    /// Container path the item lives in (e.g. `performances`).
    pub container: String,
    pub portal_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Scalar and textual attributes written by the field mapping.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Subject tags (genre plus editorial pinned tags).
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Rich-text price block.
    #[serde(default)]
    pub price: String,
    /// Rich-text availability block (status button / label).
    #[serde(default)]
    pub availability: String,
    /// Rich-text arrangement block.
    #[serde(default)]
    pub arrangements: String,
    #[serde(default)]
    pub state: PublicationState,
    #[serde(default)]
    pub dates: DateRange,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    /// A fresh, private item with no attributes.
    pub fn new(
        container: impl Into<String>,
        portal_type: impl Into<String>,
        performance_id: PerformanceId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        ContentItem {
            performance_id,
            container: container.into(),
            portal_type: portal_type.into(),
            title: title.into(),
            description: description.into(),
            attributes: BTreeMap::new(),
            subjects: Vec::new(),
            price: String::new(),
            availability: String::new(),
            arrangements: String::new(),
            state: PublicationState::Private,
            dates: DateRange::default(),
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    /// The reconciliation key, or `None` when the stored id is blank.
    pub fn external_id(&self) -> Option<&PerformanceId> {
        if self.performance_id.is_blank() {
            None
        } else {
            Some(&self.performance_id)
        }
    }

    /// Current on-sale flag; absent or non-boolean counts as `false`.
    pub fn onsale(&self) -> bool {
        self.attributes
            .get(ONSALE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Text value of an attribute, if it holds a string.
    pub fn text_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn is_published(&self) -> bool {
        self.state == PublicationState::Published
    }
}

/// Secondary lookup data for an arrangement's add-on product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
