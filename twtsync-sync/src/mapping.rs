//! Field mapping table: upstream field name → content attribute.
//!
//! The table is an immutable value handed to the [`crate::SyncManager`] at
//! construction. Each upstream field has exactly one destination; a table
//! with a repeated field name is rejected when it is built.

use std::collections::BTreeMap;

use thiserror::Error;

use twtsync_core::settings::MappingEntry;

/// Default table as `(upstream field, attribute)`. An empty attribute marks
/// the field as explicitly ignored.
const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("title", "performance_title"),
    ("id", "performance_id"),
    ("season", "season"),
    ("eventType", "eventType"),
    ("eventGenre", "subjects"),
    ("subtitle", "subtitle"),
    ("tags", "tags"),
    ("facility", "location"),
    ("performanceStatus", "performanceStatus"),
    ("onsale", "onsale"),
    ("startOnlineSalesDate", "startOnlineSalesDate"),
    ("endOnlineSalesDate", "endOnlineSalesDate"),
    ("statusMessage", "statusMessage"),
    ("percentageTaken", "percentageTaken"),
    ("startDateTime", "start"),
    ("endDateTime", "end"),
    ("ranks", "price"),
    ("code", ""),
    ("facilityCode", ""),
    ("event", ""),
    ("end", ""),
    ("start", ""),
    ("satellite", ""),
    ("facilityAddressLines", ""),
    ("date", ""),
    ("arrangements", ""),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("field '{field}' appears more than once in the mapping table")]
    Duplicate { field: String },

    #[error("field '{field}' has neither an attribute nor `ignore: true`")]
    MissingAttribute { field: String },
}

/// Destination of one upstream field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Attribute(String),
    Ignore,
}

/// Outcome of [`FieldMappingTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Mapped(&'a str),
    /// Listed in the table and deliberately dropped.
    Ignored,
    /// Not in the table at all.
    Unmapped,
}

impl<'a> Resolution<'a> {
    pub fn attribute(self) -> Option<&'a str> {
        match self {
            Resolution::Mapped(attr) => Some(attr),
            Resolution::Ignored | Resolution::Unmapped => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMappingTable {
    entries: BTreeMap<String, MappingTarget>,
}

impl FieldMappingTable {
    /// Build from `(field, target)` pairs, rejecting repeated field names.
    pub fn new<I, S>(entries: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (S, MappingTarget)>,
        S: Into<String>,
    {
        let mut table = BTreeMap::new();
        for (field, target) in entries {
            let field = field.into();
            if table.contains_key(&field) {
                return Err(MappingError::Duplicate { field });
            }
            table.insert(field, target);
        }
        Ok(FieldMappingTable { entries: table })
    }

    /// Build from the `mapping:` list of the settings file.
    pub fn from_entries(entries: &[MappingEntry]) -> Result<Self, MappingError> {
        let pairs = entries
            .iter()
            .map(|e| {
                let target = match (&e.attribute, e.ignore) {
                    (_, true) => MappingTarget::Ignore,
                    (Some(attr), false) if !attr.is_empty() => {
                        MappingTarget::Attribute(attr.clone())
                    }
                    _ => {
                        return Err(MappingError::MissingAttribute {
                            field: e.field.clone(),
                        })
                    }
                };
                Ok((e.field.clone(), target))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pairs)
    }

    pub fn resolve(&self, field: &str) -> Resolution<'_> {
        match self.entries.get(field) {
            Some(MappingTarget::Attribute(attr)) => Resolution::Mapped(attr),
            Some(MappingTarget::Ignore) => Resolution::Ignored,
            None => Resolution::Unmapped,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingTarget)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for FieldMappingTable {
    fn default() -> Self {
        let entries = DEFAULT_TABLE.iter().map(|(field, attr)| {
            let target = if attr.is_empty() {
                MappingTarget::Ignore
            } else {
                MappingTarget::Attribute((*attr).to_string())
            };
            ((*field).to_string(), target)
        });
        FieldMappingTable {
            entries: entries.collect(),
        }
    }
}
