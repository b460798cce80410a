//! Optional field extraction
//!
//! Lists the dotted occurrence paths of every optional field reachable from a
//! request message. A field counts as optional when the scanner recorded its
//! `<declaring message>.<field>` key, or when the descriptor itself marks it.
//! Because the key is the declaring type rather than the position, a message
//! embedded twice contributes its optional fields under both occurrences.

use crate::options::{DescentGuard, TemplateOptions};
use crate::scanner::ExplicitOptionalPaths;
use crate::schema::{Cardinality, MessageId, ResolvedSchema};
use crate::template::{FieldKind, field_kind};

/// Collects optional field paths relative to a request root
#[derive(Debug, Clone, Copy)]
pub struct OptionalFieldExtractor<'a> {
    schema: &'a ResolvedSchema,
    explicit: &'a ExplicitOptionalPaths,
    options: TemplateOptions,
}

impl<'a> OptionalFieldExtractor<'a> {
    /// Create an extractor with default options
    pub fn new(schema: &'a ResolvedSchema, explicit: &'a ExplicitOptionalPaths) -> Self {
        Self::with_options(schema, explicit, &TemplateOptions::default())
    }

    /// Create an extractor honouring the recursion bounds in `options`
    pub fn with_options(
        schema: &'a ResolvedSchema,
        explicit: &'a ExplicitOptionalPaths,
        options: &TemplateOptions,
    ) -> Self {
        Self {
            schema,
            explicit,
            options: *options,
        }
    }

    /// Optional paths under `message`, in declaration order
    pub fn extract(&self, message: MessageId) -> Vec<String> {
        let mut found = Vec::new();
        let mut guard = DescentGuard::new(&self.options, message);
        self.visit(message, "", &mut guard, &mut found);
        found
    }

    fn visit(
        &self,
        id: MessageId,
        prefix: &str,
        guard: &mut DescentGuard<'_>,
        found: &mut Vec<String>,
    ) {
        let message = self.schema.message(id);
        for field in &message.fields {
            let occurrence = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };

            let key = format!("{}.{}", message.scoped_name, field.name);
            if field.explicit_optional || self.explicit.contains(&key) {
                found.push(occurrence.clone());
            }

            // Repeated and map fields render as empty containers, so there is
            // nothing beneath them to point at.
            if field.cardinality != Cardinality::Singular {
                continue;
            }
            if let FieldKind::Message(child) = field_kind(self.schema, id, field) {
                if guard.enter(child) {
                    self.visit(child, &occurrence, guard, found);
                    guard.leave();
                }
            }
        }
    }
}
