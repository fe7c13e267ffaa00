//! Per-field value transforms.
//!
//! Special fields are resolved once into a [`FieldTransform`] variant; every
//! other mapped field goes through [`coerce`] and generic assignment.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;

use twtsync_core::types::ContentItem;
use twtsync_renderer::{HtmlRenderer, RenderError};

/// Format of `startDateTime` / `endDateTime`.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot parse '{value}' in field '{field}' as YYYY-MM-DD HH:MM")]
    Parse { field: String, value: String },

    #[error("field '{field}' should be {expected}")]
    Shape { field: String, expected: &'static str },

    #[error("field '{field}' could not be rendered: {source}")]
    Render {
        field: String,
        #[source]
        source: RenderError,
    },
}

/// What a transform did.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    /// Write this value to the mapped attribute, even when it is empty.
    Assign(Value),
    /// The transform wrote to the item itself; nothing more to do.
    Handled,
    /// Fall back to generic assignment of the coerced raw value.
    NotApplicable,
}

/// Special-cased upstream fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTransform {
    Title,
    Genre,
    StartDate,
    EndDate,
    Tags,
    Ranks,
}

/// Collaborators a transform may read.
pub struct TransformContext<'a> {
    pub renderer: &'a HtmlRenderer,
    pub pinned_subjects: &'a [String],
}

impl FieldTransform {
    pub fn all() -> &'static [FieldTransform] {
        &[
            FieldTransform::Title,
            FieldTransform::Genre,
            FieldTransform::StartDate,
            FieldTransform::EndDate,
            FieldTransform::Tags,
            FieldTransform::Ranks,
        ]
    }

    /// Upstream field this transform is registered for.
    pub fn field(&self) -> &'static str {
        match self {
            FieldTransform::Title => "title",
            FieldTransform::Genre => "eventGenre",
            FieldTransform::StartDate => "startDateTime",
            FieldTransform::EndDate => "endDateTime",
            FieldTransform::Tags => "tags",
            FieldTransform::Ranks => "ranks",
        }
    }

    pub fn apply(
        &self,
        ctx: &TransformContext<'_>,
        item: &mut ContentItem,
        field: &str,
        raw: &Value,
    ) -> Result<TransformResult, TransformError> {
        match self {
            FieldTransform::Title => {
                let title = match raw {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    _ => return Err(shape(field, "a string")),
                };
                item.title = title.clone();
                Ok(TransformResult::Assign(Value::String(title)))
            }
            FieldTransform::Genre => {
                let genres = genre_list(field, raw)?;
                item.subjects = merge_subjects(&item.subjects, genres, ctx.pinned_subjects);
                Ok(TransformResult::Handled)
            }
            FieldTransform::StartDate => {
                if let Some(start) = date_value(field, raw)? {
                    item.dates.set_start(start);
                }
                Ok(TransformResult::Handled)
            }
            FieldTransform::EndDate => {
                if let Some(end) = date_value(field, raw)? {
                    item.dates.set_end(end);
                }
                Ok(TransformResult::Handled)
            }
            FieldTransform::Tags => Ok(TransformResult::Assign(raw.clone())),
            FieldTransform::Ranks => {
                let ranks: &[Value] = match raw {
                    Value::Array(ranks) => ranks,
                    Value::Null => &[],
                    _ => return Err(shape(field, "a list of ranks")),
                };
                item.price = ctx
                    .renderer
                    .render_prices(ranks)
                    .map_err(|source| TransformError::Render {
                        field: field.to_string(),
                        source,
                    })?;
                Ok(TransformResult::Handled)
            }
        }
    }
}

/// Field name → transform lookup, built once.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, FieldTransform>,
}

impl TransformRegistry {
    /// A registry without any special fields.
    pub fn empty() -> Self {
        TransformRegistry {
            transforms: HashMap::new(),
        }
    }

    pub fn register(&mut self, field: impl Into<String>, transform: FieldTransform) {
        self.transforms.insert(field.into(), transform);
    }

    pub fn transform_for(&self, field: &str) -> Option<FieldTransform> {
        self.transforms.get(field).copied()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for transform in FieldTransform::all() {
            registry.register(transform.field(), *transform);
        }
        registry
    }
}

/// Generic value coercion: integers become strings, everything else is kept.
pub fn coerce(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Value::String(n.to_string()),
        other => other.clone(),
    }
}

pub fn parse_date_time(field: &str, value: &str) -> Result<NaiveDateTime, TransformError> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_TIME_FORMAT).map_err(|_| {
        TransformError::Parse {
            field: field.to_string(),
            value: value.to_string(),
        }
    })
}

/// Pinned subjects already on the item, followed by the new genres.
pub fn merge_subjects(current: &[String], genres: Vec<String>, pinned: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = current
        .iter()
        .filter(|s| pinned.contains(s))
        .cloned()
        .collect();
    for genre in genres {
        if !merged.contains(&genre) {
            merged.push(genre);
        }
    }
    merged
}

fn genre_list(field: &str, raw: &Value) -> Result<Vec<String>, TransformError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.trim().to_string()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| shape(field, "a string or a list of strings"))
            })
            .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
            .collect(),
        _ => Err(shape(field, "a string or a list of strings")),
    }
}

/// `None` for null or blank values: the bound stays unset.
fn date_value(field: &str, raw: &Value) -> Result<Option<NaiveDateTime>, TransformError> {
    match raw {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_date_time(field, s).map(Some),
        _ => Err(shape(field, "a YYYY-MM-DD HH:MM string")),
    }
}

fn shape(field: &str, expected: &'static str) -> TransformError {
    TransformError::Shape {
        field: field.to_string(),
        expected,
    }
}
