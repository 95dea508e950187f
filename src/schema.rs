use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Label used for properties that do not declare a `type`, including
/// property values that are not objects at all.
pub const UNTYPED_LABEL: &str = "undefined";

/// The parts of a JSON schema document that the diagram shows.
///
/// Only the top level is read; nested `properties` stay inside
/// [`PropertySchema::nested`] counts and are never expanded into nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub properties: IndexMap<String, PropertySchema>,
}

/// What a property declares under `type`. Anything that is not a string or
/// a list of strings is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyType {
    #[default]
    Untyped,
    Named(String),
    Union(Vec<String>),
    Raw(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Number of nested properties declared below this one.
    pub nested: usize,
}

impl PropertySchema {
    pub fn type_label(&self) -> String {
        match &self.kind {
            PropertyType::Untyped => UNTYPED_LABEL.to_string(),
            PropertyType::Named(name) => name.clone(),
            PropertyType::Union(names) => names.join(" | "),
            PropertyType::Raw(value) => value.to_string(),
        }
    }
}

impl Schema {
    /// Parse schema text. Property order follows the document.
    ///
    /// Only the JSON syntax and the presence of `properties` are checked;
    /// odd property shapes still produce a node.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let Value::Object(root) = value else {
            return Err(ParseError::NotAnObject {
                found: json_kind(value),
            });
        };

        let entries = match root.get("properties") {
            None | Some(Value::Null) => return Err(ParseError::MissingProperties),
            Some(properties) => entries(properties),
        };

        let properties = entries
            .into_iter()
            .map(|(name, raw)| (name, parse_property(&raw)))
            .collect();

        Ok(Self {
            title: string_field(root, "title"),
            kind: string_field(root, "type"),
            properties,
        })
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl FromStr for Schema {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schema::parse(s)
    }
}

/// Name/value pairs of a `properties` value. Arrays and strings are keyed by
/// index; other scalars have no entries.
fn entries(properties: &Value) -> Vec<(String, Value)> {
    match properties {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value.clone()))
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(index, ch)| (index.to_string(), Value::String(ch.to_string())))
            .collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) => Vec::new(),
    }
}

fn parse_property(raw: &Value) -> PropertySchema {
    let Value::Object(fields) = raw else {
        return PropertySchema::default();
    };

    let kind = match fields.get("type") {
        None => PropertyType::Untyped,
        Some(Value::String(single)) => PropertyType::Named(single.clone()),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => PropertyType::Union(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Some(other) => PropertyType::Raw(other.clone()),
    };

    let nested = match fields.get("properties") {
        Some(Value::Object(children)) => children.len(),
        _ => 0,
    };

    PropertySchema {
        kind,
        description: string_field(fields, "description"),
        nested,
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
