//! Resolved schema model
//!
//! A [`ResolvedSchema`] is the linked view of every file that took part in one
//! resolution: a tree of namespaces whose children are messages, enums,
//! services and further namespaces. Messages, enums and namespaces live in
//! arenas and are addressed by id, which keeps lookups cheap and lets the tree
//! and the by-name index share the same storage.
//!
//! The schema is built once by [`SchemaBuilder`] and never mutated afterwards.

use std::collections::HashMap;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};

/// Fully qualified name of the well-known timestamp message
pub const TIMESTAMP_TYPE: &str = "google.protobuf.Timestamp";

/// Handle to a message in a [`ResolvedSchema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub(crate) usize);

/// Handle to an enum in a [`ResolvedSchema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(usize);

/// Handle to a namespace in a [`ResolvedSchema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(usize);

/// A resolved reference to a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    /// A message type
    Message(MessageId),
    /// An enum type
    Enum(EnumId),
}

/// A child of a namespace
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// Nested package segment
    Namespace(NamespaceId),
    /// Top-level message of the package
    Message(MessageId),
    /// Top-level enum of the package
    Enum(EnumId),
    /// Service declared in the package
    Service(ServiceDefinition),
}

/// A package segment
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Last package segment (empty for the root)
    pub name: String,
    /// Dotted package name (empty for the root)
    pub full_name: String,
    /// Children in declaration order
    pub nested: Vec<SchemaNode>,
}

/// Proto scalar keywords
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    /// Map a descriptor field type to a scalar, `None` for messages, enums and groups
    pub fn from_descriptor(ty: Type) -> Option<Self> {
        let scalar = match ty {
            Type::Double => ScalarType::Double,
            Type::Float => ScalarType::Float,
            Type::Int32 => ScalarType::Int32,
            Type::Int64 => ScalarType::Int64,
            Type::Uint32 => ScalarType::Uint32,
            Type::Uint64 => ScalarType::Uint64,
            Type::Sint32 => ScalarType::Sint32,
            Type::Sint64 => ScalarType::Sint64,
            Type::Fixed32 => ScalarType::Fixed32,
            Type::Fixed64 => ScalarType::Fixed64,
            Type::Sfixed32 => ScalarType::Sfixed32,
            Type::Sfixed64 => ScalarType::Sfixed64,
            Type::Bool => ScalarType::Bool,
            Type::String => ScalarType::String,
            Type::Bytes => ScalarType::Bytes,
            Type::Message | Type::Enum | Type::Group => return None,
        };
        Some(scalar)
    }
}

/// A field's declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Built-in scalar keyword
    Scalar(ScalarType),
    /// Message or enum name as written (or fully qualified with a leading dot)
    Named(String),
}

/// How many values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// One value
    Singular,
    /// `repeated`
    Repeated,
    /// `map<K, V>`, represented on the wire as a repeated map entry
    Map,
}

/// A message field
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name as declared
    pub name: String,
    /// Field number
    pub number: i32,
    /// Declared type
    pub type_ref: TypeRef,
    /// Singular, repeated or map
    pub cardinality: Cardinality,
    /// Declared with an explicit `optional`, as far as the descriptor tells
    pub explicit_optional: bool,
}

/// A message type
#[derive(Debug, Clone)]
pub struct MessageType {
    /// Simple name
    pub name: String,
    /// Fully qualified name including the package
    pub full_name: String,
    /// Chain of enclosing message names without the package (e.g. `Outer.Inner`)
    pub scoped_name: String,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    /// Messages and enums declared inside this message
    pub nested: Vec<TypeId>,
    /// Synthesized entry type of a map field
    pub map_entry: bool,
}

impl MessageType {
    /// Whether this is the well-known timestamp message
    pub fn is_timestamp(&self) -> bool {
        self.full_name == TIMESTAMP_TYPE
    }
}

/// An enum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Value name
    pub name: String,
    /// Value number
    pub number: i32,
}

/// An enum type
#[derive(Debug, Clone)]
pub struct EnumType {
    /// Simple name
    pub name: String,
    /// Fully qualified name including the package
    pub full_name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
}

impl EnumType {
    /// The first declared value, which is the enum's default
    pub fn default_value(&self) -> Option<&EnumValue> {
        self.values.first()
    }
}

/// An RPC method
#[derive(Debug, Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Request type as written in the service
    pub request_type: String,
    /// Response type as written in the service
    pub response_type: String,
    /// Whether the client streams requests
    pub client_streaming: bool,
    /// Whether the server streams responses
    pub server_streaming: bool,
}

/// A service definition
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Simple name
    pub name: String,
    /// Fully qualified name including the package
    pub full_name: String,
    /// File the service was declared in
    pub file: String,
    /// Methods in declaration order
    pub methods: Vec<Method>,
}

impl ServiceDefinition {
    /// Package the service lives in, used as the lookup scope for its methods
    pub fn package(&self) -> &str {
        parent_scope(&self.full_name)
    }
}

/// The linked, immutable schema produced by one resolution
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    namespaces: Vec<Namespace>,
    messages: Vec<MessageType>,
    enums: Vec<EnumType>,
    by_name: HashMap<String, TypeId>,
    /// Every registered type in declaration order
    order: Vec<TypeId>,
}

impl ResolvedSchema {
    /// Build a schema from already parsed file descriptors
    ///
    /// Files are merged in the order given. The well-known timestamp type is
    /// always available.
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a FileDescriptorProto>) -> Self {
        let mut builder = SchemaBuilder::seeded();
        for file in files {
            builder.add_file(file);
        }
        builder.finish()
    }

    /// The root namespace
    pub fn root(&self) -> &Namespace {
        &self.namespaces[0]
    }

    /// Namespace by id
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    /// Message by id
    pub fn message(&self, id: MessageId) -> &MessageType {
        &self.messages[id.0]
    }

    /// Enum by id
    pub fn enum_type(&self, id: EnumId) -> &EnumType {
        &self.enums[id.0]
    }

    /// All messages in registration order
    pub fn messages(&self) -> impl Iterator<Item = (MessageId, &MessageType)> {
        self.messages
            .iter()
            .enumerate()
            .map(|(index, message)| (MessageId(index), message))
    }

    /// Exact lookup by fully qualified name (a leading dot is ignored)
    pub fn find(&self, full_name: &str) -> Option<TypeId> {
        self.by_name
            .get(full_name.trim_start_matches('.'))
            .copied()
    }

    /// Exact lookup of a message by fully qualified name
    pub fn find_message(&self, full_name: &str) -> Option<MessageId> {
        match self.find(full_name)? {
            TypeId::Message(id) => Some(id),
            TypeId::Enum(_) => None,
        }
    }

    /// Look up `name` among the types declared inside `scope`
    ///
    /// Dotted names walk further into nested scopes (`Inner.Deep`).
    pub fn lookup_nested(&self, scope: MessageId, name: &str) -> Option<TypeId> {
        if name.starts_with('.') {
            return None;
        }
        let mut current = scope;
        let mut segments = name.split('.').peekable();
        while let Some(segment) = segments.next() {
            let found = self
                .message(current)
                .nested
                .iter()
                .copied()
                .find(|ty| self.type_name(*ty) == segment)?;
            if segments.peek().is_none() {
                return Some(found);
            }
            match found {
                TypeId::Message(id) => current = id,
                TypeId::Enum(_) => return None,
            }
        }
        None
    }

    /// Look up a message by qualified name, resolved from `scope` outward
    pub fn lookup_message(&self, scope: &str, name: &str) -> Option<MessageId> {
        self.scope_candidates(scope, name)
            .into_iter()
            .find_map(|candidate| self.find_message(&candidate))
    }

    /// Look up a message or enum, resolved from `scope` outward and then by
    /// name suffix anywhere in the schema
    pub fn lookup_type(&self, scope: &str, name: &str) -> Option<TypeId> {
        if let Some(found) = self
            .scope_candidates(scope, name)
            .into_iter()
            .find_map(|candidate| self.find(&candidate))
        {
            return Some(found);
        }
        if name.starts_with('.') {
            return None;
        }
        let suffix = format!(".{name}");
        self.order.iter().copied().find(|ty| {
            let full_name = self.type_full_name(*ty);
            full_name == name || full_name.ends_with(&suffix)
        })
    }

    /// Resolve a field type name written inside message `scope`
    ///
    /// Nested types shadow global ones: the nested scope is searched first,
    /// then qualified message names, then any message or enum.
    pub fn resolve(&self, scope: MessageId, name: &str) -> Option<TypeId> {
        if let Some(found) = self.lookup_nested(scope, name) {
            return Some(found);
        }
        let scope_name = &self.message(scope).full_name;
        if let Some(id) = self.lookup_message(scope_name, name) {
            return Some(TypeId::Message(id));
        }
        self.lookup_type(scope_name, name)
    }

    /// Every service, in namespace walk order
    ///
    /// The walk is depth-first over each namespace's children in declaration
    /// order, driven by an explicit stack.
    pub fn services(&self) -> Vec<&ServiceDefinition> {
        let mut found = Vec::new();
        let mut stack = vec![self.root().nested.iter()];
        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(SchemaNode::Service(service)) => found.push(service),
                Some(SchemaNode::Namespace(id)) => stack.push(self.namespace(*id).nested.iter()),
                Some(SchemaNode::Message(_) | SchemaNode::Enum(_)) => {}
                None => {
                    stack.pop();
                }
            }
        }
        found
    }

    fn type_name(&self, ty: TypeId) -> &str {
        match ty {
            TypeId::Message(id) => &self.message(id).name,
            TypeId::Enum(id) => &self.enum_type(id).name,
        }
    }

    fn type_full_name(&self, ty: TypeId) -> &str {
        match ty {
            TypeId::Message(id) => &self.message(id).full_name,
            TypeId::Enum(id) => &self.enum_type(id).full_name,
        }
    }

    /// Candidate full names for `name` seen from `scope`, innermost first
    fn scope_candidates(&self, scope: &str, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![absolute.to_string()];
        }
        let mut candidates = Vec::new();
        let mut current = scope;
        loop {
            candidates.push(qualify(current, name));
            if current.is_empty() {
                break;
            }
            current = parent_scope(current);
        }
        candidates
    }
}

/// Accumulates file descriptors into a [`ResolvedSchema`]
#[derive(Debug)]
pub(crate) struct SchemaBuilder {
    namespaces: Vec<Namespace>,
    messages: Vec<MessageType>,
    enums: Vec<EnumType>,
    by_name: HashMap<String, TypeId>,
    order: Vec<TypeId>,
}

impl SchemaBuilder {
    /// An empty builder with only the root namespace
    pub(crate) fn new() -> Self {
        Self {
            namespaces: vec![Namespace {
                name: String::new(),
                full_name: String::new(),
                nested: Vec::new(),
            }],
            messages: Vec::new(),
            enums: Vec::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// A builder that already knows `google.protobuf.Timestamp`
    pub(crate) fn seeded() -> Self {
        let mut builder = Self::new();
        builder.add_file(&crate::resolver::TIMESTAMP_FILE);
        builder
    }

    /// Merge one file into the schema
    ///
    /// Types whose full name is already registered are skipped, so the first
    /// definition of a name wins.
    pub(crate) fn add_file(&mut self, file: &FileDescriptorProto) {
        let package = file.package();
        let namespace = self.namespace_for(package);
        let proto2 = matches!(file.syntax(), "" | "proto2");

        for proto in &file.enum_type {
            if let Some(id) = self.add_enum(package, proto) {
                self.namespaces[namespace.0].nested.push(SchemaNode::Enum(id));
            }
        }
        for proto in &file.message_type {
            if let Some(id) = self.add_message(package, None, proto, proto2) {
                self.namespaces[namespace.0].nested.push(SchemaNode::Message(id));
            }
        }
        for proto in &file.service {
            let service = service_from_descriptor(file.name(), package, proto);
            self.namespaces[namespace.0]
                .nested
                .push(SchemaNode::Service(service));
        }
    }

    /// Freeze the builder, classifying map fields now that every type is known
    pub(crate) fn finish(self) -> ResolvedSchema {
        let mut schema = ResolvedSchema {
            namespaces: self.namespaces,
            messages: self.messages,
            enums: self.enums,
            by_name: self.by_name,
            order: self.order,
        };

        let mut map_fields = Vec::new();
        for (message_id, message) in schema.messages() {
            for (index, field) in message.fields.iter().enumerate() {
                if field.cardinality != Cardinality::Repeated {
                    continue;
                }
                let TypeRef::Named(name) = &field.type_ref else {
                    continue;
                };
                if let Some(TypeId::Message(entry)) = schema.resolve(message_id, name) {
                    if schema.message(entry).map_entry {
                        map_fields.push((message_id, index));
                    }
                }
            }
        }
        for (message_id, index) in map_fields {
            schema.messages[message_id.0].fields[index].cardinality = Cardinality::Map;
        }

        schema
    }

    /// Find or create the namespace chain for a dotted package
    fn namespace_for(&mut self, package: &str) -> NamespaceId {
        let mut current = NamespaceId(0);
        for segment in package.split('.').filter(|segment| !segment.is_empty()) {
            let existing = self.namespaces[current.0].nested.iter().find_map(|node| match node {
                SchemaNode::Namespace(id) if self.namespaces[id.0].name == segment => Some(*id),
                _ => None,
            });
            current = match existing {
                Some(id) => id,
                None => {
                    let id = NamespaceId(self.namespaces.len());
                    let full_name = qualify(&self.namespaces[current.0].full_name, segment);
                    self.namespaces.push(Namespace {
                        name: segment.to_string(),
                        full_name,
                        nested: Vec::new(),
                    });
                    self.namespaces[current.0]
                        .nested
                        .push(SchemaNode::Namespace(id));
                    id
                }
            };
        }
        current
    }

    fn register(&mut self, full_name: String, ty: TypeId) {
        self.by_name.insert(full_name, ty);
        self.order.push(ty);
    }

    fn add_message(
        &mut self,
        scope: &str,
        enclosing: Option<&str>,
        proto: &DescriptorProto,
        proto2: bool,
    ) -> Option<MessageId> {
        let name = proto.name().to_string();
        let full_name = qualify(scope, &name);
        if self.by_name.contains_key(&full_name) {
            tracing::debug!(type_name = %full_name, "duplicate message definition skipped");
            return None;
        }
        let scoped_name = match enclosing {
            Some(enclosing) => format!("{enclosing}.{name}"),
            None => name.clone(),
        };

        let id = MessageId(self.messages.len());
        self.messages.push(MessageType {
            name,
            full_name: full_name.clone(),
            scoped_name: scoped_name.clone(),
            fields: proto
                .field
                .iter()
                .map(|field| field_from_descriptor(field, proto2))
                .collect(),
            nested: Vec::new(),
            map_entry: proto
                .options
                .as_ref()
                .and_then(|options| options.map_entry)
                .unwrap_or(false),
        });
        self.register(full_name.clone(), TypeId::Message(id));

        let mut nested = Vec::new();
        for child in &proto.enum_type {
            if let Some(child) = self.add_enum(&full_name, child) {
                nested.push(TypeId::Enum(child));
            }
        }
        for child in &proto.nested_type {
            if let Some(child) = self.add_message(&full_name, Some(&scoped_name), child, proto2) {
                nested.push(TypeId::Message(child));
            }
        }
        self.messages[id.0].nested = nested;

        Some(id)
    }

    fn add_enum(&mut self, scope: &str, proto: &EnumDescriptorProto) -> Option<EnumId> {
        let name = proto.name().to_string();
        let full_name = qualify(scope, &name);
        if self.by_name.contains_key(&full_name) {
            tracing::debug!(type_name = %full_name, "duplicate enum definition skipped");
            return None;
        }

        let id = EnumId(self.enums.len());
        self.enums.push(EnumType {
            name,
            full_name: full_name.clone(),
            values: proto
                .value
                .iter()
                .map(|value| EnumValue {
                    name: value.name().to_string(),
                    number: value.number(),
                })
                .collect(),
        });
        self.register(full_name, TypeId::Enum(id));
        Some(id)
    }
}

fn field_from_descriptor(field: &FieldDescriptorProto, proto2: bool) -> Field {
    let scalar = field
        .r#type
        .and_then(|ty| Type::try_from(ty).ok())
        .and_then(ScalarType::from_descriptor);
    let type_ref = match scalar {
        Some(scalar) => TypeRef::Scalar(scalar),
        None => TypeRef::Named(field.type_name().to_string()),
    };

    let label = field.label.and_then(|label| Label::try_from(label).ok());
    let cardinality = match label {
        Some(Label::Repeated) => Cardinality::Repeated,
        _ => Cardinality::Singular,
    };

    // proto2 requires a label on every field outside a oneof, so an
    // optional label there was written out by hand.
    let explicit_optional = field.proto3_optional.unwrap_or(false)
        || (proto2 && label == Some(Label::Optional) && field.oneof_index.is_none());

    Field {
        name: field.name().to_string(),
        number: field.number(),
        type_ref,
        cardinality,
        explicit_optional,
    }
}

fn service_from_descriptor(
    file: &str,
    package: &str,
    proto: &ServiceDescriptorProto,
) -> ServiceDefinition {
    ServiceDefinition {
        name: proto.name().to_string(),
        full_name: qualify(package, proto.name()),
        file: file.to_string(),
        methods: proto
            .method
            .iter()
            .map(|method| Method {
                name: method.name().to_string(),
                request_type: method.input_type().to_string(),
                response_type: method.output_type().to_string(),
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
            })
            .collect(),
    }
}

/// Join a scope and a name with a dot, skipping the dot for the root scope
pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn parent_scope(full_name: &str) -> &str {
    match full_name.rfind('.') {
        Some(index) => &full_name[..index],
        None => "",
    }
}
