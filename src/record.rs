use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::synonyms;

/// One row as the data store hands it over.
///
/// `specialties` and `states` arrive in whatever shape the row was written with,
/// so they stay as raw JSON until [`LooseList`] decodes them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReviewer {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub specialties: Value,
    #[serde(default)]
    pub states: Value,
    #[serde(default)]
    pub availability: Value,
}

impl RawReviewer {
    pub fn is_available(&self) -> bool {
        value_text(&self.availability).to_lowercase() == "available"
    }
}

/// A list-valued field in one of the shapes seen in the wild.
#[derive(Debug, Clone, PartialEq)]
pub enum LooseList {
    Sequence(Vec<Value>),
    /// A string holding a JSON array, already parsed.
    JsonString(Vec<Value>),
    /// Comma-separated text.
    DelimitedString(String),
    Absent,
}

impl LooseList {
    pub fn decode(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Sequence(items),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Array(items)) => Self::JsonString(items),
                _ => Self::DelimitedString(text),
            },
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Object(_) => Self::Absent,
        }
    }

    pub fn into_items(self) -> Vec<String> {
        match self {
            Self::Sequence(items) | Self::JsonString(items) => {
                items.into_iter().filter_map(truthy_text).collect()
            }
            Self::DelimitedString(text) => text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Absent => Vec::new(),
        }
    }
}

/// Canonical directory entry.
///
/// Fields are private so the specialty index can only be produced from the
/// specialties it was built with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reviewer {
    id: Option<Value>,
    name: String,
    specialties: Vec<String>,
    states: Vec<String>,
    #[serde(skip)]
    specialty_index: BTreeSet<String>,
}

impl Reviewer {
    pub fn new(
        id: Option<Value>,
        name: impl Into<String>,
        mut specialties: Vec<String>,
        states: Vec<String>,
    ) -> Self {
        specialties.sort();
        specialties.dedup();

        let mut states: Vec<String> = states.into_iter().map(|s| s.to_uppercase()).collect();
        states.sort();
        states.dedup();

        let specialty_index = synonyms::build_index(&specialties);
        Self {
            id: id.filter(|v| !v.is_null()),
            name: name.into(),
            specialties,
            states,
            specialty_index,
        }
    }

    /// Never fails: malformed fields degrade to a best-effort split or nothing.
    pub fn from_raw(raw: RawReviewer) -> Self {
        let specialties = LooseList::decode(raw.specialties).into_items();
        let states = LooseList::decode(raw.states).into_items();
        Self::new(raw.id, value_text(&raw.name), specialties, states)
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specialties(&self) -> &[String] {
        &self.specialties
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn specialty_index(&self) -> &BTreeSet<String> {
        &self.specialty_index
    }
}

fn truthy_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

pub(crate) fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
