use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::format_float;

/// `{name}`, `{obj.field}`, `{global.name}`. Brace groups that do not match
/// are ordinary text.
pub(crate) static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\}").unwrap()
});

#[derive(Clone, Debug, PartialEq)]
pub struct TycoString {
    pub value: String,
    pub has_template: bool,
    pub is_literal: bool,
}

impl TycoString {
    pub fn new(value: String, has_template: bool, is_literal: bool) -> Self {
        Self {
            value,
            has_template,
            is_literal,
        }
    }

    /// A double-quoted string; expanded later if it holds placeholders.
    pub fn basic(value: impl Into<String>) -> Self {
        let value = value.into();
        let has_template = PLACEHOLDER_RE.is_match(&value);
        Self::new(value, has_template, false)
    }

    /// A single-quoted string, never expanded.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::new(value.into(), false, true)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    struct_name: String,
    fields: IndexMap<String, Value>,
}

impl Instance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            struct_name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn struct_name(&self) -> &str {
        &self.struct_name
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in schema order.
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub(crate) fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub(crate) fn get_attribute_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }
}

/// Identity of a keyed instance: struct name plus primary-key value.
///
/// The target is looked up through [`crate::Document::dereference`]; the
/// reference itself never owns the referenced data.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub struct_name: String,
    pub key: Box<Value>,
}

impl Reference {
    pub fn new(struct_name: impl Into<String>, key: Value) -> Self {
        Self {
            struct_name: struct_name.into(),
            key: Box::new(key),
        }
    }

    pub fn key_text(&self) -> String {
        self.key.key_text()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(TycoString),
    Date(String),
    Time(String),
    DateTime(String),
    Array(Vec<Value>),
    Instance(Instance),
    Reference(Reference),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Instance(_) => "instance",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            Value::Date(v) | Value::Time(v) | Value::DateTime(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Text substituted for a `{placeholder}` naming this value. Arrays and
    /// inline instances have no text form.
    pub fn to_template_text(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(format_float(*v)),
            Value::String(s) => Some(s.value.clone()),
            Value::Date(v) | Value::Time(v) | Value::DateTime(v) => Some(v.clone()),
            Value::Reference(reference) => Some(reference.key_text()),
            Value::Array(_) | Value::Instance(_) => None,
        }
    }

    pub(crate) fn key_text(&self) -> String {
        self.to_template_text().unwrap_or_default()
    }

    /// Marks a string as final so template expansion leaves it untouched.
    pub(crate) fn freeze_template(&mut self) {
        if let Value::String(s) = self {
            s.has_template = false;
        }
    }
}
