use std::{collections::HashMap, fmt};

use indexmap::IndexMap;

use crate::value::{Instance, Reference, Value};

/// Declared type of a field or global attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Str,
    Int,
    Float,
    Bool,
    Date,
    Time,
    DateTime,
    Array(Box<TypeTag>),
    Struct(String),
}

impl TypeTag {
    pub fn primitive(name: &str) -> Option<Self> {
        Some(match name {
            "str" => TypeTag::Str,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "bool" => TypeTag::Bool,
            "date" => TypeTag::Date,
            "time" => TypeTag::Time,
            "datetime" => TypeTag::DateTime,
            _ => return None,
        })
    }

    /// Primitive, non-array types; the only ones usable as primary keys.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, TypeTag::Array(_) | TypeTag::Struct(_))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Str => f.write_str("str"),
            TypeTag::Int => f.write_str("int"),
            TypeTag::Float => f.write_str("float"),
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Date => f.write_str("date"),
            TypeTag::Time => f.write_str("time"),
            TypeTag::DateTime => f.write_str("datetime"),
            TypeTag::Array(element) => write!(f, "array<{element}>"),
            TypeTag::Struct(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_tag: TypeTag,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// Already coerced to `type_tag`.
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            nullable: false,
            is_primary_key: false,
            default: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    name: String,
    fields: Vec<FieldDef>,
    primary_key_field: Option<String>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key_field: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        let name = self.primary_key_field.as_deref()?;
        self.field(name)
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key_field.is_some()
    }

    pub(crate) fn add_field(&mut self, field: FieldDef) {
        if field.is_primary_key {
            self.primary_key_field = Some(field.name.clone());
        }
        self.fields.push(field);
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut FieldDef> {
        self.fields.iter_mut().find(|field| field.name == name)
    }
}

/// A fully resolved Tyco document.
///
/// Globals, struct definitions and instances keep declaration order.
/// References are stored by identity and dereferenced through a per-struct
/// primary-key index.
#[derive(Clone, Debug, Default)]
pub struct Document {
    globals: IndexMap<String, Value>,
    structs: IndexMap<String, StructDef>,
    instances: IndexMap<String, Vec<Instance>>,
    primary_index: HashMap<String, HashMap<String, usize>>,
}

impl Document {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn globals(&self) -> &IndexMap<String, Value> {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn structs(&self) -> &IndexMap<String, StructDef> {
        &self.structs
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    /// Instances of `struct_name` in declaration order.
    pub fn instances(&self, struct_name: &str) -> &[Instance] {
        self.instances
            .get(struct_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Looks up a keyed instance by the text form of its primary key.
    pub fn find(&self, struct_name: &str, key: &str) -> Option<&Instance> {
        let position = self.position(struct_name, key)?;
        self.instances(struct_name).get(position)
    }

    pub fn dereference(&self, reference: &Reference) -> Option<&Instance> {
        self.find(&reference.struct_name, &reference.key_text())
    }

    pub(crate) fn position(&self, struct_name: &str, key: &str) -> Option<usize> {
        self.primary_index.get(struct_name)?.get(key).copied()
    }

    pub(crate) fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub(crate) fn global_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.globals.get_mut(name)
    }

    pub(crate) fn add_struct(&mut self, struct_def: StructDef) {
        self.instances
            .entry(struct_def.name().to_string())
            .or_default();
        self.structs
            .insert(struct_def.name().to_string(), struct_def);
    }

    pub(crate) fn struct_def_mut(&mut self, name: &str) -> Option<&mut StructDef> {
        self.structs.get_mut(name)
    }

    pub(crate) fn add_instance(&mut self, instance: Instance) {
        self.instances
            .entry(instance.struct_name().to_string())
            .or_default()
            .push(instance);
    }

    pub(crate) fn instance_mut(&mut self, struct_name: &str, index: usize) -> Option<&mut Instance> {
        self.instances.get_mut(struct_name)?.get_mut(index)
    }

    pub(crate) fn set_primary_index(&mut self, struct_name: &str, index: HashMap<String, usize>) {
        self.primary_index.insert(struct_name.to_string(), index);
    }
}
