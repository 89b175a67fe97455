//! Turns a parsed [`SyntaxTree`] into a resolved [`Document`].
//!
//! Resolution runs in fixed passes over the whole tree: schema building,
//! globals, instances (defaults plus literal coercion), reference linking,
//! and finally template expansion. Each pass sees the complete output of
//! the previous one, so declaration order never matters for references.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    document::{Document, FieldDef, StructDef, TypeTag},
    error::{SourceSpan, TycoError},
    lexer::StrLit,
    options::ParserOptions,
    syntax::{
        Argument, Assignment, GlobalNode, InstanceNode, Item, Literal, LiteralKind, StructNode,
        SyntaxTree, TypeExpr,
    },
    temporal,
    value::{Instance, Reference, TycoString, Value, PLACEHOLDER_RE},
};

pub(crate) fn resolve(tree: SyntaxTree, options: &ParserOptions) -> Result<Document, TycoError> {
    let mut structs = Vec::new();
    let mut globals = Vec::new();
    let mut instances = Vec::new();
    for item in tree.items {
        match item {
            Item::Struct(node) => structs.push(node),
            Item::Global(node) => globals.push(node),
            Item::Instance(node) => instances.push(node),
            Item::Include { path, span } => {
                return Err(TycoError::parse(format!(
                    "#include \"{path}\" must be expanded before resolution"
                ))
                .with_span(span))
            }
        }
    }

    let mut resolver = Resolver::new(options);
    resolver.build_schema(&structs)?;
    resolver.resolve_globals(&globals)?;
    resolver.resolve_instances(&instances)?;
    resolver.link_references()?;
    resolver.expand_templates()?;

    debug!(
        globals = resolver.doc.globals().len(),
        structs = resolver.doc.structs().len(),
        instances = instances.len(),
        "resolved tyco document"
    );
    Ok(resolver.doc)
}

/// Where a value lives: a global attribute or a top-level instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Owner {
    Global(String),
    Instance(String, usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Step {
    Field(String),
    Index(usize),
}

/// Address of a value inside the document. For an instance owner the path
/// starts with a field name; an empty path names the instance itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Slot {
    owner: Owner,
    path: Vec<Step>,
}

impl Slot {
    fn global(name: &str) -> Self {
        Self {
            owner: Owner::Global(name.to_string()),
            path: Vec::new(),
        }
    }

    fn instance(struct_name: &str, index: usize) -> Self {
        Self {
            owner: Owner::Instance(struct_name.to_string(), index),
            path: Vec::new(),
        }
    }

    fn child(&self, step: Step) -> Self {
        let mut path = self.path.clone();
        path.push(step);
        Self {
            owner: self.owner.clone(),
            path,
        }
    }

    fn parent(&self) -> Option<Self> {
        let (_, rest) = self.path.split_last()?;
        Some(Self {
            owner: self.owner.clone(),
            path: rest.to_vec(),
        })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Owner::Global(name) => f.write_str(name)?,
            Owner::Instance(struct_name, index) => write!(f, "{struct_name}[{index}]")?,
        }
        for step in &self.path {
            match step {
                Step::Field(name) => write!(f, ".{name}")?,
                Step::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

struct Resolver<'a> {
    options: &'a ParserOptions,
    doc: Document,
    global_spans: HashMap<String, SourceSpan>,
    instance_spans: HashMap<String, Vec<SourceSpan>>,
    visiting: HashSet<Slot>,
}

impl<'a> Resolver<'a> {
    fn new(options: &'a ParserOptions) -> Self {
        Self {
            options,
            doc: Document::new(),
            global_spans: HashMap::new(),
            instance_spans: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn build_schema(&mut self, nodes: &[StructNode]) -> Result<(), TycoError> {
        // Register every name first so field types may point forward.
        for node in nodes {
            if self.doc.struct_def(&node.name).is_some() {
                return Err(TycoError::parse(format!(
                    "Struct '{}' is defined more than once",
                    node.name
                ))
                .with_span(node.span.clone()));
            }
            self.doc.add_struct(StructDef::new(&node.name));
        }

        for node in nodes {
            let mut def = StructDef::new(&node.name);
            for field in &node.fields {
                if def.field(&field.name).is_some() {
                    return Err(TycoError::parse(format!(
                        "Field '{}' is declared twice in struct '{}'",
                        field.name, node.name
                    ))
                    .with_span(field.span.clone()));
                }
                let type_tag = self
                    .resolve_type(&field.type_expr)
                    .map_err(|e| e.with_span(field.span.clone()))?;
                if field.primary_key && (!type_tag.is_scalar() || field.nullable) {
                    return Err(TycoError::parse(format!(
                        "Primary key '{}' of struct '{}' must be a non-nullable scalar, not {}{type_tag}",
                        field.name,
                        node.name,
                        if field.nullable { "nullable " } else { "" },
                    ))
                    .with_span(field.span.clone()));
                }
                let mut schema = FieldDef::new(&field.name, type_tag);
                schema.nullable = field.nullable;
                schema.is_primary_key = field.primary_key;
                def.add_field(schema);
            }
            self.doc.add_struct(def);
        }

        for node in nodes {
            for field in &node.fields {
                let Some(literal) = &field.default else {
                    continue;
                };
                let Some(schema) = self
                    .doc
                    .struct_def(&node.name)
                    .and_then(|def| def.field(&field.name))
                else {
                    continue;
                };
                let (type_tag, nullable) = (schema.type_tag.clone(), schema.nullable);
                let value = self.coerce(literal, &type_tag, nullable)?;
                if let Some(schema) = self
                    .doc
                    .struct_def_mut(&node.name)
                    .and_then(|def| def.field_mut(&field.name))
                {
                    schema.default = Some(value);
                }
            }
        }

        trace!(count = nodes.len(), "built struct schemas");
        Ok(())
    }

    fn resolve_type(&self, expr: &TypeExpr) -> Result<TypeTag, TycoError> {
        match expr {
            TypeExpr::Array(element) => Ok(TypeTag::Array(Box::new(self.resolve_type(element)?))),
            TypeExpr::Named(name) => TypeTag::primitive(name)
                .or_else(|| {
                    self.doc
                        .struct_def(name)
                        .map(|def| TypeTag::Struct(def.name().to_string()))
                })
                .ok_or_else(|| TycoError::parse(format!("Unknown type '{name}'"))),
        }
    }

    fn resolve_globals(&mut self, nodes: &[GlobalNode]) -> Result<(), TycoError> {
        for node in nodes {
            if self.doc.global(&node.name).is_some() {
                return Err(TycoError::parse(format!(
                    "Global attribute '{}' is defined more than once",
                    node.name
                ))
                .with_span(node.span.clone()));
            }
            if self.doc.struct_def(&node.name).is_some() {
                return Err(TycoError::parse(format!(
                    "Global attribute '{}' clashes with the struct of the same name",
                    node.name
                ))
                .with_span(node.span.clone()));
            }
            let value = match &node.type_expr {
                Some(expr) => {
                    let type_tag = self
                        .resolve_type(expr)
                        .map_err(|e| e.with_span(node.span.clone()))?;
                    self.coerce(&node.value, &type_tag, node.nullable)?
                }
                None => self.infer(&node.value)?,
            };
            self.doc.set_global(node.name.clone(), value);
            self.global_spans
                .insert(node.name.clone(), node.span.clone());
        }
        trace!(count = nodes.len(), "resolved global attributes");
        Ok(())
    }

    fn resolve_instances(&mut self, nodes: &[InstanceNode]) -> Result<(), TycoError> {
        let mut grouped: IndexMap<&str, Vec<&InstanceNode>> = IndexMap::new();
        for node in nodes {
            if self.doc.struct_def(&node.struct_name).is_none() {
                return Err(TycoError::parse(format!(
                    "Instance of undeclared struct '{}'",
                    node.struct_name
                ))
                .with_span(node.span.clone()));
            }
            grouped.entry(node.struct_name.as_str()).or_default().push(node);
        }

        let order: Vec<String> = self.doc.structs().keys().cloned().collect();
        for name in order {
            let Some(group) = grouped.get(name.as_str()) else {
                continue;
            };
            let Some(def) = self.doc.struct_def(&name).cloned() else {
                continue;
            };
            for node in group {
                let instance = self.instantiate_top_level(&def, node)?;
                self.doc.add_instance(instance);
                self.instance_spans
                    .entry(name.clone())
                    .or_default()
                    .push(node.span.clone());
            }
            trace!(struct_name = %name, count = group.len(), "resolved instances");
        }
        Ok(())
    }

    fn instantiate_top_level(
        &self,
        def: &StructDef,
        node: &InstanceNode,
    ) -> Result<Instance, TycoError> {
        let mut provided = Vec::with_capacity(node.fields.len() + 1);
        if let Some(key) = &node.key {
            let primary = def.primary_key_field().ok_or_else(|| {
                TycoError::type_error(format!(
                    "Struct '{}' has no primary key; write {}() for unkeyed instances",
                    def.name(),
                    def.name()
                ))
                .with_span(key.span.clone())
            })?;
            if let Some(duplicate) = node.fields.iter().find(|a| a.name == primary.name) {
                return Err(TycoError::parse(format!(
                    "Primary key '{}' is given both in the header and the body",
                    primary.name
                ))
                .with_span(duplicate.span.clone()));
            }
            provided.push((primary.name.as_str(), key));
        }
        for assignment in &node.fields {
            provided.push((assignment.name.as_str(), &assignment.value));
        }
        self.instantiate(def, provided, &node.span)
    }

    /// Builds one instance: unknown fields are rejected, absent fields take
    /// their default (or `null` when nullable), present ones are coerced.
    fn instantiate(
        &self,
        def: &StructDef,
        provided: Vec<(&str, &Literal)>,
        span: &SourceSpan,
    ) -> Result<Instance, TycoError> {
        let mut given: HashMap<&str, &Literal> = HashMap::with_capacity(provided.len());
        for (name, literal) in provided {
            if def.field(name).is_none() {
                return Err(TycoError::parse(format!(
                    "Unknown field '{name}' for struct '{}'",
                    def.name()
                ))
                .with_span(literal.span.clone()));
            }
            if given.insert(name, literal).is_some() {
                return Err(
                    TycoError::parse(format!("Field '{name}' is assigned more than once"))
                        .with_span(literal.span.clone()),
                );
            }
        }

        let mut instance = Instance::new(def.name());
        for field in def.fields() {
            let mut value = match given.get(field.name.as_str()) {
                Some(literal) => self.coerce(literal, &field.type_tag, field.nullable)?,
                None => self.default_for(def, field, span)?,
            };
            if field.is_primary_key {
                value.freeze_template();
            }
            instance.set_attribute(field.name.clone(), value);
        }
        Ok(instance)
    }

    fn default_for(
        &self,
        def: &StructDef,
        field: &FieldDef,
        span: &SourceSpan,
    ) -> Result<Value, TycoError> {
        match &field.default {
            Some(value) => Ok(value.clone()),
            None if field.nullable => Ok(Value::Null),
            None => Err(TycoError::MissingRequiredField {
                struct_name: def.name().to_string(),
                field: field.name.clone(),
                span: Some(span.clone()),
            }),
        }
    }

    fn coerce(&self, literal: &Literal, type_tag: &TypeTag, nullable: bool) -> Result<Value, TycoError> {
        let span = || literal.span.clone();
        let mismatch = || {
            TycoError::type_error(format!(
                "Expected {type_tag}, found {}",
                literal.describe()
            ))
            .with_span(span())
        };

        match (&literal.kind, type_tag) {
            (LiteralKind::Null, _) if nullable => Ok(Value::Null),
            (LiteralKind::Null, _) => Err(TycoError::type_error(format!(
                "null is not allowed for non-nullable {type_tag}"
            ))
            .with_span(span())),
            (LiteralKind::Str(text), TypeTag::Str) => Ok(Value::String(string_value(text))),
            (LiteralKind::Int(value), TypeTag::Int) => Ok(Value::Int(*value)),
            (LiteralKind::Int(value), TypeTag::Float) => widen(*value)
                .map(Value::Float)
                .map_err(|e| e.with_span(span())),
            (LiteralKind::Float(value), TypeTag::Float) => Ok(Value::Float(*value)),
            (LiteralKind::Bool(value), TypeTag::Bool) => Ok(Value::Bool(*value)),
            (
                LiteralKind::Date(text) | LiteralKind::Str(StrLit { value: text, .. }),
                TypeTag::Date,
            ) => temporal::parse_date(text)
                .map(Value::Date)
                .map_err(|e| e.with_span(span())),
            (
                LiteralKind::Time(text) | LiteralKind::Str(StrLit { value: text, .. }),
                TypeTag::Time,
            ) => temporal::parse_time(text)
                .map(Value::Time)
                .map_err(|e| e.with_span(span())),
            (
                LiteralKind::DateTime(text) | LiteralKind::Str(StrLit { value: text, .. }),
                TypeTag::DateTime,
            ) => temporal::parse_datetime(text)
                .map(Value::DateTime)
                .map_err(|e| e.with_span(span())),
            (LiteralKind::Array(items), TypeTag::Array(element)) => items
                .iter()
                .map(|item| self.coerce(item, element, nullable))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (LiteralKind::Call { name, args }, TypeTag::Struct(expected)) => {
                if name != expected {
                    return Err(mismatch());
                }
                self.call(name, args, &literal.span)
            }
            (LiteralKind::Block { type_name, fields }, TypeTag::Struct(expected)) => {
                if type_name.as_ref().is_some_and(|name| name != expected) {
                    return Err(mismatch());
                }
                self.inline_block(expected, fields, &literal.span)
            }
            _ => Err(mismatch()),
        }
    }

    /// `Name(args)`: a reference when `Name` is keyed, otherwise an inline
    /// instance built from positional and named arguments.
    fn call(&self, name: &str, args: &[Argument], span: &SourceSpan) -> Result<Value, TycoError> {
        let def = self.doc.struct_def(name).ok_or_else(|| {
            TycoError::parse(format!("Unknown struct '{name}'")).with_span(span.clone())
        })?;

        if let Some(primary) = def.primary_key_field() {
            let [Argument { name: None, value }] = args else {
                return Err(TycoError::parse(format!(
                    "Reference {name}(...) takes exactly one primary-key argument"
                ))
                .with_span(span.clone()));
            };
            let mut key = self.coerce(value, &primary.type_tag, false)?;
            key.freeze_template();
            return Ok(Value::Reference(Reference::new(name, key)));
        }

        let mut provided = Vec::with_capacity(args.len());
        let mut seen_named = false;
        for (position, arg) in args.iter().enumerate() {
            match &arg.name {
                Some(field) => {
                    seen_named = true;
                    provided.push((field.as_str(), &arg.value));
                }
                None if seen_named => {
                    return Err(TycoError::parse(
                        "Positional arguments cannot follow named arguments",
                    )
                    .with_span(arg.value.span.clone()))
                }
                None => {
                    let field = def.fields().get(position).ok_or_else(|| {
                        TycoError::parse(format!("Too many positional arguments for {name}"))
                            .with_span(arg.value.span.clone())
                    })?;
                    provided.push((field.name.as_str(), &arg.value));
                }
            }
        }
        self.instantiate(def, provided, span).map(Value::Instance)
    }

    fn inline_block(
        &self,
        name: &str,
        fields: &[Assignment],
        span: &SourceSpan,
    ) -> Result<Value, TycoError> {
        let def = self.doc.struct_def(name).ok_or_else(|| {
            TycoError::parse(format!("Unknown struct '{name}'")).with_span(span.clone())
        })?;
        if def.has_primary_key() {
            return Err(TycoError::type_error(format!(
                "Struct '{name}' has a primary key; declare the instance at top level and refer to it as {name}(key)"
            ))
            .with_span(span.clone()));
        }
        let provided = fields
            .iter()
            .map(|assignment| (assignment.name.as_str(), &assignment.value))
            .collect();
        self.instantiate(def, provided, span).map(Value::Instance)
    }

    /// Values of untyped globals take the type their literal spells.
    fn infer(&self, literal: &Literal) -> Result<Value, TycoError> {
        let span = || literal.span.clone();
        match &literal.kind {
            LiteralKind::Str(text) => Ok(Value::String(string_value(text))),
            LiteralKind::Int(value) => Ok(Value::Int(*value)),
            LiteralKind::Float(value) => Ok(Value::Float(*value)),
            LiteralKind::Bool(value) => Ok(Value::Bool(*value)),
            LiteralKind::Null => Ok(Value::Null),
            LiteralKind::Date(text) => temporal::parse_date(text)
                .map(Value::Date)
                .map_err(|e| e.with_span(span())),
            LiteralKind::Time(text) => temporal::parse_time(text)
                .map(Value::Time)
                .map_err(|e| e.with_span(span())),
            LiteralKind::DateTime(text) => temporal::parse_datetime(text)
                .map(Value::DateTime)
                .map_err(|e| e.with_span(span())),
            LiteralKind::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.infer(item))
                    .collect::<Result<Vec<_>, _>>()?;
                homogenize(values).map_err(|e| e.with_span(span()))
            }
            LiteralKind::Call { name, args } => self.call(name, args, &literal.span),
            LiteralKind::Block {
                type_name: Some(name),
                fields,
            } => self.inline_block(name, fields, &literal.span),
            LiteralKind::Block { type_name: None, .. } => Err(TycoError::type_error(
                "Cannot infer the struct of an anonymous block; declare the attribute's type",
            )
            .with_span(span())),
        }
    }

    fn link_references(&mut self) -> Result<(), TycoError> {
        let keyed: Vec<(String, String)> = self
            .doc
            .structs()
            .values()
            .filter_map(|def| {
                def.primary_key_field()
                    .map(|field| (def.name().to_string(), field.name.clone()))
            })
            .collect();

        for (struct_name, key_field) in keyed {
            let mut index = HashMap::new();
            for (position, instance) in self.doc.instances(&struct_name).iter().enumerate() {
                let key = instance
                    .get_attribute(&key_field)
                    .map(Value::key_text)
                    .unwrap_or_default();
                if index.insert(key.clone(), position).is_some() {
                    let span = self.owner_span(&Owner::Instance(struct_name.clone(), position));
                    return Err(TycoError::DuplicatePrimaryKey {
                        struct_name,
                        key,
                        span,
                    });
                }
            }
            self.doc.set_primary_index(&struct_name, index);
        }

        for (name, value) in self.doc.globals() {
            self.check_references(value)
                .map_err(|e| e.with_optional_span(self.global_spans.get(name).cloned()))?;
        }
        for struct_name in self.doc.structs().keys() {
            for (position, instance) in self.doc.instances(struct_name).iter().enumerate() {
                let owner = Owner::Instance(struct_name.clone(), position);
                for value in instance.attributes().values() {
                    self.check_references(value)
                        .map_err(|e| e.with_optional_span(self.owner_span(&owner)))?;
                }
            }
        }
        for def in self.doc.structs().values() {
            for default in def.fields().iter().filter_map(|field| field.default.as_ref()) {
                self.check_references(default)?;
            }
        }
        Ok(())
    }

    fn check_references(&self, value: &Value) -> Result<(), TycoError> {
        match value {
            Value::Reference(reference) if self.doc.dereference(reference).is_none() => {
                Err(TycoError::UnresolvedReference {
                    struct_name: reference.struct_name.clone(),
                    key: reference.key_text(),
                    span: None,
                })
            }
            Value::Array(items) => items.iter().try_for_each(|item| self.check_references(item)),
            Value::Instance(instance) => instance
                .attributes()
                .values()
                .try_for_each(|item| self.check_references(item)),
            _ => Ok(()),
        }
    }

    fn expand_templates(&mut self) -> Result<(), TycoError> {
        let mut pending = Vec::new();
        for (name, value) in self.doc.globals() {
            collect_templates(value, Slot::global(name), &mut pending);
        }
        for struct_name in self.doc.structs().keys() {
            for (position, instance) in self.doc.instances(struct_name).iter().enumerate() {
                let slot = Slot::instance(struct_name, position);
                for (field, value) in instance.attributes() {
                    collect_templates(value, slot.child(Step::Field(field.clone())), &mut pending);
                }
            }
        }

        trace!(count = pending.len(), "expanding templates");
        for slot in pending {
            self.expand(&slot, 0)?;
        }
        Ok(())
    }

    /// Expands the string at `slot` in place, expanding whatever it refers
    /// to first. A slot seen again before it finishes is a cycle.
    fn expand(&mut self, slot: &Slot, depth: usize) -> Result<(), TycoError> {
        let raw = match self.value_at(slot) {
            Some(Value::String(text)) if text.has_template => text.value.clone(),
            _ => return Ok(()),
        };
        if depth > self.options.max_template_depth || !self.visiting.insert(slot.clone()) {
            return Err(TycoError::TemplateCycle {
                slot: slot.to_string(),
                span: self.owner_span(&slot.owner),
            });
        }

        let mut rendered = String::with_capacity(raw.len());
        let mut last = 0;
        for captures in PLACEHOLDER_RE.captures_iter(&raw) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            rendered.push_str(&raw[last..whole.start()]);
            let target = self.locate(path.as_str(), slot).ok_or_else(|| {
                TycoError::UndefinedTemplateVariable {
                    name: path.as_str().to_string(),
                    span: self.owner_span(&slot.owner),
                }
            })?;
            self.expand(&target, depth + 1)?;
            let text = self
                .value_at(&target)
                .and_then(Value::to_template_text)
                .ok_or_else(|| {
                    TycoError::type_error(format!(
                        "'{}' cannot be interpolated into a string",
                        path.as_str()
                    ))
                    .with_optional_span(self.owner_span(&slot.owner))
                })?;
            rendered.push_str(&text);
            last = whole.end();
        }
        rendered.push_str(&raw[last..]);

        self.visiting.remove(slot);
        if let Some(Value::String(text)) = self.value_at_mut(slot) {
            text.value = rendered;
            text.has_template = false;
        }
        Ok(())
    }

    /// Finds the slot a placeholder path names, relative to the string at `at`.
    ///
    /// A bare name looks at globals before the enclosing instance; the head
    /// of a dotted path looks at the enclosing instance first. `global.` forces
    /// the global namespace.
    fn locate(&self, placeholder: &str, at: &Slot) -> Option<Slot> {
        let segments: Vec<&str> = placeholder.split('.').collect();
        let (forced_global, segments) = match segments.split_first() {
            Some((&"global", rest)) if !rest.is_empty() => (true, rest),
            _ => (false, segments.as_slice()),
        };
        let (first, rest) = segments.split_first()?;

        let global = || {
            self.doc
                .global(first)
                .map(|_| Slot::global(first))
        };
        let local = || {
            self.scope_of(at)
                .and_then(|scope| self.field_slot(&scope, first))
        };
        let mut slot = if forced_global {
            global()
        } else if rest.is_empty() {
            global().or_else(local)
        } else {
            local().or_else(global)
        }?;

        for segment in rest {
            let object = self.follow(slot)?;
            slot = self.field_slot(&object, segment)?;
        }
        Some(slot)
    }

    /// Nearest instance enclosing `slot`.
    fn scope_of(&self, slot: &Slot) -> Option<Slot> {
        let mut candidate = slot.parent()?;
        loop {
            if self.is_object(&candidate) {
                return Some(candidate);
            }
            candidate = candidate.parent()?;
        }
    }

    fn is_object(&self, slot: &Slot) -> bool {
        match (&slot.owner, slot.path.is_empty()) {
            (Owner::Instance(..), true) => true,
            _ => matches!(self.value_at(slot), Some(Value::Instance(_))),
        }
    }

    fn object_at(&self, slot: &Slot) -> Option<&Instance> {
        match (&slot.owner, slot.path.is_empty()) {
            (Owner::Instance(struct_name, index), true) => {
                self.doc.instances(struct_name).get(*index)
            }
            _ => self.value_at(slot)?.as_instance(),
        }
    }

    fn field_slot(&self, object: &Slot, field: &str) -> Option<Slot> {
        self.object_at(object)?
            .has_attribute(field)
            .then(|| object.child(Step::Field(field.to_string())))
    }

    /// Steps through a reference to the instance it names.
    fn follow(&self, slot: Slot) -> Option<Slot> {
        match self.value_at(&slot) {
            Some(Value::Reference(reference)) => {
                let position = self
                    .doc
                    .position(&reference.struct_name, &reference.key_text())?;
                Some(Slot::instance(&reference.struct_name, position))
            }
            _ => Some(slot),
        }
    }

    fn value_at(&self, slot: &Slot) -> Option<&Value> {
        let (mut current, rest) = match &slot.owner {
            Owner::Global(name) => (self.doc.global(name)?, slot.path.as_slice()),
            Owner::Instance(struct_name, index) => {
                let (Step::Field(field), rest) = slot.path.split_first()? else {
                    return None;
                };
                let instance = self.doc.instances(struct_name).get(*index)?;
                (instance.get_attribute(field)?, rest)
            }
        };
        for step in rest {
            current = match (step, current) {
                (Step::Field(field), Value::Instance(instance)) => instance.get_attribute(field)?,
                (Step::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn value_at_mut(&mut self, slot: &Slot) -> Option<&mut Value> {
        let (mut current, rest) = match &slot.owner {
            Owner::Global(name) => (self.doc.global_mut(name)?, slot.path.as_slice()),
            Owner::Instance(struct_name, index) => {
                let (Step::Field(field), rest) = slot.path.split_first()? else {
                    return None;
                };
                let instance = self.doc.instance_mut(struct_name, *index)?;
                (instance.get_attribute_mut(field)?, rest)
            }
        };
        for step in rest {
            current = match (step, current) {
                (Step::Field(field), Value::Instance(instance)) => {
                    instance.get_attribute_mut(field)?
                }
                (Step::Index(index), Value::Array(items)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn owner_span(&self, owner: &Owner) -> Option<SourceSpan> {
        match owner {
            Owner::Global(name) => self.global_spans.get(name).cloned(),
            Owner::Instance(struct_name, index) => self
                .instance_spans
                .get(struct_name)
                .and_then(|spans| spans.get(*index))
                .cloned(),
        }
    }
}

fn string_value(text: &StrLit) -> TycoString {
    if text.literal {
        TycoString::literal(text.value.clone())
    } else {
        TycoString::basic(text.value.clone())
    }
}

fn collect_templates(value: &Value, slot: Slot, pending: &mut Vec<Slot>) {
    match value {
        Value::String(text) if text.has_template => pending.push(slot),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_templates(item, slot.child(Step::Index(index)), pending);
            }
        }
        Value::Instance(instance) => {
            for (field, item) in instance.attributes() {
                collect_templates(item, slot.child(Step::Field(field.clone())), pending);
            }
        }
        _ => {}
    }
}

/// Largest integer magnitude up to which every `i64` has an exact `f64`.
const MAX_EXACT_FLOAT_INT: u64 = 1 << 53;

fn widen(value: i64) -> Result<f64, TycoError> {
    if value.unsigned_abs() > MAX_EXACT_FLOAT_INT {
        return Err(TycoError::type_error(format!(
            "Integer {value} cannot be represented exactly as a float"
        )));
    }
    Ok(value as f64)
}

/// Kind of an inferred value, `None` for `null`. Arrays carry their element
/// kind (`array<int>`); an array with no typed elements is `array<?>`.
fn element_kind(value: &Value) -> Result<Option<String>, TycoError> {
    Ok(match value {
        Value::Null => None,
        Value::Instance(instance) => Some(instance.struct_name().to_string()),
        Value::Reference(reference) => Some(reference.struct_name.clone()),
        Value::Array(items) => Some(format!(
            "array<{}>",
            common_kind(items)?.unwrap_or_else(|| "?".to_string())
        )),
        other => Some(other.type_name().to_string()),
    })
}

fn array_element(kind: &str) -> Option<&str> {
    kind.strip_prefix("array<")?.strip_suffix('>')
}

fn unify(a: &str, b: &str) -> Option<String> {
    if a == b {
        return Some(a.to_string());
    }
    match (a, b) {
        ("int", "float") | ("float", "int") => Some("float".to_string()),
        _ => match (array_element(a)?, array_element(b)?) {
            ("?", other) | (other, "?") => Some(format!("array<{other}>")),
            (left, right) => unify(left, right).map(|kind| format!("array<{kind}>")),
        },
    }
}

fn common_kind(values: &[Value]) -> Result<Option<String>, TycoError> {
    let mut common: Option<String> = None;
    for value in values {
        let Some(kind) = element_kind(value)? else {
            continue;
        };
        common = Some(match common {
            None => kind,
            Some(current) => unify(&current, &kind).ok_or_else(|| {
                TycoError::type_error(format!(
                    "Array elements must share one type, found {current} and {kind}"
                ))
            })?,
        });
    }
    Ok(common)
}

/// Widens ints to floats wherever `kind` settled on `float`, at any depth.
fn conform(value: Value, kind: &str) -> Result<Value, TycoError> {
    match (value, array_element(kind)) {
        (Value::Int(v), _) if kind == "float" => widen(v).map(Value::Float),
        (Value::Array(items), Some(element)) => items
            .into_iter()
            .map(|item| conform(item, element))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (other, _) => Ok(other),
    }
}

/// Untyped arrays must hold one kind of element, nested arrays included;
/// ints widen to floats when mixed with them. Nulls are allowed anywhere.
fn homogenize(values: Vec<Value>) -> Result<Value, TycoError> {
    match common_kind(&values)? {
        Some(kind) => values
            .into_iter()
            .map(|value| conform(value, &kind))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        None => Ok(Value::Array(values)),
    }
}
