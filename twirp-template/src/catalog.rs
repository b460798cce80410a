//! Method catalog
//!
//! Walks every service in a schema and pairs each method with its request
//! template and optional field list. A method whose request type cannot be
//! resolved still gets an entry, with an empty template.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::imports::ImportSet;
use crate::optional::OptionalFieldExtractor;
use crate::options::{KeyStyle, TemplateOptions};
use crate::resolver::SchemaResolver;
use crate::scanner::{ExplicitOptionalPaths, scan};
use crate::schema::{Method, ResolvedSchema, ServiceDefinition, TypeId};
use crate::template::TemplateGenerator;

/// One RPC method with its generated request template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCatalogEntry {
    /// Method name
    pub name: String,
    /// Fully qualified service name
    pub service: String,
    /// Request type as declared
    pub request_type: String,
    /// Response type as declared
    pub response_type: String,
    /// Whether the client streams requests
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub client_streaming: bool,
    /// Whether the server streams responses
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub server_streaming: bool,
    /// Default-valued request body
    pub template: Map<String, Value>,
    /// Dotted paths of optional fields within `template`
    pub optional_fields: Vec<String>,
}

/// Catalog of methods keyed according to [`KeyStyle`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MethodCatalog {
    entries: BTreeMap<String, MethodCatalogEntry>,
}

impl MethodCatalog {
    /// Entry by key
    pub fn get(&self, key: &str) -> Option<&MethodCatalogEntry> {
        self.entries.get(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MethodCatalogEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &MethodCatalogEntry) -> bool) {
        self.entries.retain(|key, entry| keep(key, entry));
    }

    /// Templates only, keyed like the catalog
    pub fn templates(&self) -> BTreeMap<String, Map<String, Value>> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.template.clone()))
            .collect()
    }

    /// Optional field lists only, keyed like the catalog
    pub fn optional_fields(&self) -> BTreeMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.optional_fields.clone()))
            .collect()
    }
}

impl IntoIterator for MethodCatalog {
    type Item = (String, MethodCatalogEntry);
    type IntoIter = std::collections::btree_map::IntoIter<String, MethodCatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Builds a [`MethodCatalog`] from a resolved schema
#[derive(Debug, Clone, Copy)]
pub struct CatalogBuilder<'a> {
    schema: &'a ResolvedSchema,
    explicit: &'a ExplicitOptionalPaths,
    options: TemplateOptions,
}

impl<'a> CatalogBuilder<'a> {
    /// Create a builder with default options
    pub fn new(schema: &'a ResolvedSchema, explicit: &'a ExplicitOptionalPaths) -> Self {
        Self {
            schema,
            explicit,
            options: TemplateOptions::default(),
        }
    }

    /// Replace the options
    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the catalog over every service in the schema
    pub fn build(&self) -> MethodCatalog {
        self.build_filtered(|_| true)
    }

    /// Build the catalog over the services accepted by `include`
    pub fn build_filtered(&self, include: impl Fn(&ServiceDefinition) -> bool) -> MethodCatalog {
        let generator = TemplateGenerator::with_options(self.schema, &self.options);
        let extractor =
            OptionalFieldExtractor::with_options(self.schema, self.explicit, &self.options);

        let mut catalog = MethodCatalog::default();
        for service in self.schema.services() {
            if !include(service) {
                continue;
            }
            for method in &service.methods {
                let key = match self.options.key_style {
                    KeyStyle::Method => method.name.clone(),
                    KeyStyle::Qualified => format!("{}.{}", service.full_name, method.name),
                };
                let entry = self.entry(service, method, &generator, &extractor);
                if let Some(previous) = catalog.entries.insert(key, entry) {
                    tracing::debug!(
                        method = %previous.name,
                        replaced = %previous.service,
                        by = %service.full_name,
                        "method name collision, keeping the later service"
                    );
                }
            }
        }
        catalog
    }

    fn entry(
        &self,
        service: &ServiceDefinition,
        method: &Method,
        generator: &TemplateGenerator<'_>,
        extractor: &OptionalFieldExtractor<'_>,
    ) -> MethodCatalogEntry {
        let schema = self.schema;
        let request = match schema.lookup_type(service.package(), &method.request_type) {
            Some(TypeId::Message(id)) => Some(id),
            _ => {
                tracing::warn!(
                    service = %service.full_name,
                    method = %method.name,
                    request_type = %method.request_type,
                    "request type could not be resolved, emitting empty template"
                );
                None
            }
        };

        let (template, optional_fields) = match request {
            Some(id) => (generator.generate(id), extractor.extract(id)),
            None => (Map::new(), Vec::new()),
        };

        MethodCatalogEntry {
            name: method.name.clone(),
            service: service.full_name.clone(),
            request_type: method.request_type.trim_start_matches('.').to_string(),
            response_type: method.response_type.trim_start_matches('.').to_string(),
            client_streaming: method.client_streaming,
            server_streaming: method.server_streaming,
            template,
            optional_fields,
        }
    }
}

/// Resolve, scan and build the catalog for one proto source
pub fn parse_catalog(
    main_source: &str,
    imports: &ImportSet,
    options: &TemplateOptions,
) -> Result<MethodCatalog> {
    let schema = SchemaResolver::new(imports).resolve(main_source)?;
    let explicit = scan(main_source);
    Ok(CatalogBuilder::new(&schema, &explicit)
        .options(*options)
        .build())
}

/// Request templates per method name
pub fn parse_method_templates(
    main_source: &str,
    imports: &ImportSet,
) -> Result<BTreeMap<String, Map<String, Value>>> {
    let catalog = parse_catalog(main_source, imports, &TemplateOptions::default())?;
    Ok(catalog.templates())
}

/// Optional field paths per method name
pub fn parse_optional_fields(
    main_source: &str,
    imports: &ImportSet,
) -> Result<BTreeMap<String, Vec<String>>> {
    let catalog = parse_catalog(main_source, imports, &TemplateOptions::default())?;
    Ok(catalog.optional_fields())
}
