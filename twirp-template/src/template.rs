//! JSON request template generation
//!
//! Turns a message type into a JSON object holding the default value of every
//! field, recursing into message-typed fields. Generation never fails: a type
//! that cannot be resolved renders as `""`.

use serde_json::{Map, Value};

use crate::options::{DescentGuard, TemplateOptions};
use crate::schema::{
    Cardinality, EnumType, Field, MessageId, ResolvedSchema, ScalarType, TypeId, TypeRef,
};

/// What a field's declared type turned out to be
#[derive(Debug, Clone, Copy)]
pub(crate) enum FieldKind<'a> {
    Scalar(ScalarType),
    Timestamp,
    Message(MessageId),
    Enum(&'a EnumType),
    Unresolved,
}

/// Resolve the declared type of `field`, which is declared inside `scope`
pub(crate) fn field_kind<'a>(
    schema: &'a ResolvedSchema,
    scope: MessageId,
    field: &Field,
) -> FieldKind<'a> {
    let name = match &field.type_ref {
        TypeRef::Scalar(scalar) => return FieldKind::Scalar(*scalar),
        TypeRef::Named(name) => name,
    };
    match schema.resolve(scope, name) {
        Some(TypeId::Message(id)) if schema.message(id).is_timestamp() => FieldKind::Timestamp,
        Some(TypeId::Message(id)) => FieldKind::Message(id),
        Some(TypeId::Enum(id)) => FieldKind::Enum(schema.enum_type(id)),
        None => {
            tracing::debug!(
                message = %schema.message(scope).full_name,
                field = %field.name,
                type_name = %name,
                "unresolved type reference, using empty string"
            );
            FieldKind::Unresolved
        }
    }
}

/// Default JSON value for a scalar
pub fn scalar_default(scalar: ScalarType) -> Value {
    match scalar {
        ScalarType::String | ScalarType::Bytes => Value::String(String::new()),
        ScalarType::Bool => Value::Bool(false),
        ScalarType::Float | ScalarType::Double => Value::from(0.0_f64),
        _ => Value::from(0),
    }
}

/// Generates default-valued JSON templates for message types
#[derive(Debug, Clone, Copy)]
pub struct TemplateGenerator<'a> {
    schema: &'a ResolvedSchema,
    options: TemplateOptions,
}

impl<'a> TemplateGenerator<'a> {
    /// Create a generator with default options
    pub fn new(schema: &'a ResolvedSchema) -> Self {
        Self::with_options(schema, &TemplateOptions::default())
    }

    /// Create a generator honouring the recursion bounds in `options`
    pub fn with_options(schema: &'a ResolvedSchema, options: &TemplateOptions) -> Self {
        Self {
            schema,
            options: *options,
        }
    }

    /// Template for `message`, keyed by field name in declaration order
    pub fn generate(&self, message: MessageId) -> Map<String, Value> {
        let mut guard = DescentGuard::new(&self.options, message);
        self.message_template(message, &mut guard)
    }

    fn message_template(
        &self,
        id: MessageId,
        guard: &mut DescentGuard<'_>,
    ) -> Map<String, Value> {
        self.schema
            .message(id)
            .fields
            .iter()
            .map(|field| {
                let value = self.field_value(id, field, guard);
                (field.name.clone(), value)
            })
            .collect()
    }

    fn field_value(
        &self,
        scope: MessageId,
        field: &Field,
        guard: &mut DescentGuard<'_>,
    ) -> Value {
        match field.cardinality {
            Cardinality::Repeated => return Value::Array(Vec::new()),
            Cardinality::Map => return Value::Object(Map::new()),
            Cardinality::Singular => {}
        }

        match field_kind(self.schema, scope, field) {
            FieldKind::Scalar(scalar) => scalar_default(scalar),
            FieldKind::Timestamp | FieldKind::Unresolved => Value::String(String::new()),
            FieldKind::Enum(enum_type) => Value::String(
                enum_type
                    .default_value()
                    .map(|value| value.name.clone())
                    .unwrap_or_default(),
            ),
            FieldKind::Message(id) => {
                if !guard.enter(id) {
                    tracing::debug!(
                        message = %self.schema.message(id).full_name,
                        depth = guard.depth(),
                        "recursion bound reached, truncating template"
                    );
                    return Value::String(String::new());
                }
                let template = self.message_template(id, guard);
                guard.leave();
                Value::Object(template)
            }
        }
    }
}
