//! Param (tabular record set) types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A set of params keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamBank {
    pub params: BTreeMap<String, Param>,
}

impl ParamBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: Param) {
        self.params.insert(param.name.clone(), param);
    }

    /// Exact param name for `name`, ignoring case
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.params
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(|k| k.as_str())
    }

    /// Longest param name that `stem` starts with, ignoring case
    ///
    /// Lets a file such as `Bullet_new.csv` target `Bullet`.
    pub fn resolve_prefix(&self, stem: &str) -> Option<&str> {
        let lower = stem.to_lowercase();
        self.params
            .keys()
            .filter(|k| lower.starts_with(&k.to_lowercase()))
            .max_by_key(|k| k.len())
            .map(|k| k.as_str())
    }

    /// Params named in `names` ignoring case, or every param when `names` is empty
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Param>> {
        if names.is_empty() {
            return Ok(self.params.values().collect());
        }
        names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                self.resolve_name(name)
                    .and_then(|resolved| self.params.get(resolved))
                    .ok_or_else(|| Error::ParamNotFound(name.to_string()))
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Param> {
        self.params.get_mut(name)
    }
}

/// A named record set with a shared field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub rows: Vec<Row>,
}

impl Param {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            rows: Vec::new(),
        }
    }

    pub fn row(&self, id: i32) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn row_mut(&mut self, id: i32) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    /// Index of a field by internal name; exact match first, then ignoring case
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case(name))
            })
    }

    /// First row, used as the structural prototype for new rows
    pub fn template(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Build a row for `id` filled with default values
    ///
    /// Values start as a clone of the template row (or the schema's zero values
    /// when the param is empty). Signed 16/32-bit fields whose minimum is -1
    /// hold reference ids and get -1; every other field gets its schema
    /// default converted to its storage type. The param itself is not touched.
    pub fn default_row(&self, id: i32) -> Row {
        let mut row = match self.template() {
            Some(template) => template.clone(),
            None => Row {
                id,
                name: String::new(),
                values: self.fields.iter().map(|f| f.display_type.zero()).collect(),
            },
        };

        for (value, field) in row.values.iter_mut().zip(&self.fields) {
            let number = if field.is_reference() {
                -1.0
            } else {
                field.default
            };
            *value = value.coerce(number);
        }
        row.id = id;
        row
    }

    /// Insert a default row for `id` unless one exists; returns whether it was added
    pub fn add_default_row(&mut self, id: i32) -> bool {
        if self.row(id).is_some() {
            return false;
        }
        let row = self.default_row(id);
        self.rows.push(row);
        true
    }

    pub fn sort_rows(&mut self) {
        self.rows.sort_by_key(|r| r.id);
    }
}

/// Declared schema of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Internal field name used in edit scripts
    pub name: String,
    pub display_type: FieldType,
    #[serde(default)]
    pub default: f64,
    #[serde(default)]
    pub minimum: f64,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, display_type: FieldType) -> Self {
        Self {
            name: name.into(),
            display_type,
            default: 0.0,
            minimum: 0.0,
        }
    }

    /// Signed 16/32-bit field whose minimum of -1 marks "no reference"
    pub fn is_reference(&self) -> bool {
        matches!(self.display_type, FieldType::S16 | FieldType::S32) && self.minimum == -1.0
    }
}

/// Display type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    F32,
    Fixstr,
    FixstrW,
    Dummy8,
}

impl FieldType {
    /// Zero value in this type's storage representation
    pub fn zero(&self) -> FieldValue {
        match self {
            FieldType::F32 => FieldValue::Float(0.0),
            FieldType::Fixstr | FieldType::FixstrW => FieldValue::Text(String::new()),
            FieldType::Dummy8 => FieldValue::Bytes(Vec::new()),
            _ => FieldValue::Int(0),
        }
    }

    /// Inclusive bounds of the integer types
    pub fn int_range(&self) -> Option<(i64, i64)> {
        match self {
            FieldType::S8 => Some((i8::MIN.into(), i8::MAX.into())),
            FieldType::U8 => Some((0, u8::MAX.into())),
            FieldType::S16 => Some((i16::MIN.into(), i16::MAX.into())),
            FieldType::U16 => Some((0, u16::MAX.into())),
            FieldType::S32 => Some((i32::MIN.into(), i32::MAX.into())),
            FieldType::U32 => Some((0, u32::MAX.into())),
            _ => None,
        }
    }
}

/// A row of a param
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub values: Vec<FieldValue>,
}

/// A stored field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Convert a schema number into this value's storage type
    pub fn coerce(&self, number: f64) -> FieldValue {
        match self {
            FieldValue::Int(_) => FieldValue::Int(number as i64),
            FieldValue::Float(_) => FieldValue::Float(number),
            FieldValue::Text(_) => FieldValue::Text(number.to_string()),
            FieldValue::Bytes(b) => FieldValue::Bytes(vec![0; b.len()]),
        }
    }

    /// Parse `text` into the same storage type as `self`
    ///
    /// Integers outside the range of `field_type` are rejected.
    pub fn parse_like(&self, field_type: FieldType, text: &str) -> Option<FieldValue> {
        let trimmed = text.trim();
        match self {
            FieldValue::Int(_) => trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .filter(|v| {
                    field_type
                        .int_range()
                        .map_or(true, |(min, max)| (min..=max).contains(v))
                })
                .map(FieldValue::Int),
            FieldValue::Float(_) => trimmed.parse::<f64>().ok().map(FieldValue::Float),
            FieldValue::Text(_) => Some(FieldValue::Text(text.to_string())),
            FieldValue::Bytes(_) => parse_bytes(trimmed).map(FieldValue::Bytes),
        }
    }

    /// Canonical textual form; arrays render as `[b0|b1|...]`
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Equality as the differencer sees it
    pub fn same_as(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Bytes(_), _) | (_, FieldValue::Bytes(_)) => {
                self.canonical() == other.canonical()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                write!(f, "[{}]", parts.join("|"))
            }
        }
    }
}

fn parse_bytes(text: &str) -> Option<Vec<u8>> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner.split('|').map(|b| b.trim().parse::<u8>().ok()).collect()
}
