//! Schema resolution
//!
//! Parses the main proto source, follows its imports through an [`ImportSet`]
//! and links everything into one [`ResolvedSchema`]. Parsing itself is
//! delegated to protox; this module owns which file an import refers to and
//! what happens when it cannot be found.

use std::collections::{HashSet, VecDeque};

use once_cell::sync::Lazy;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use protox::file::{File, FileResolver, GoogleFileResolver};

use crate::error::{Error, Result};
use crate::imports::ImportSet;
use crate::schema::{ResolvedSchema, SchemaBuilder};

/// Name the main source is registered under unless told otherwise
pub const MAIN_FILE_NAME: &str = "main.proto";

/// Built-in `google/protobuf/timestamp.proto`, seeded into every schema
pub(crate) static TIMESTAMP_FILE: Lazy<FileDescriptorProto> = Lazy::new(|| {
    let field = |name: &str, number: i32, ty: Type| FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("google/protobuf/timestamp.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Timestamp".to_string()),
            field: vec![
                field("seconds", 1, Type::Int64),
                field("nanos", 2, Type::Int32),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
});

/// Resolve `main_source` against `imports` using the default main file name
pub fn resolve(main_source: &str, imports: &ImportSet) -> Result<ResolvedSchema> {
    SchemaResolver::new(imports).resolve(main_source)
}

/// Links a main proto source and its imports into a [`ResolvedSchema`]
#[derive(Debug, Clone)]
pub struct SchemaResolver<'a> {
    imports: &'a ImportSet,
    main_name: String,
}

impl<'a> SchemaResolver<'a> {
    /// Create a resolver over `imports`
    pub fn new(imports: &'a ImportSet) -> Self {
        Self {
            imports,
            main_name: MAIN_FILE_NAME.to_string(),
        }
    }

    /// Register the main source under `name` (used in diagnostics and for
    /// breaking import cycles back to the main file)
    pub fn main_name(mut self, name: impl Into<String>) -> Self {
        self.main_name = name.into();
        self
    }

    /// Parse and link `main_source`
    ///
    /// Fails only if `main_source` itself does not parse. Imports that are
    /// missing or malformed are logged and skipped.
    pub fn resolve(&self, main_source: &str) -> Result<ResolvedSchema> {
        let main = File::from_source(&self.main_name, main_source)
            .map_err(|err| Error::schema(&self.main_name, err))?;

        let mut builder = SchemaBuilder::seeded();
        builder.add_file(main.file_descriptor_proto());

        let mut visited = HashSet::from([self.main_name.clone()]);
        let mut pending: VecDeque<(String, String)> = main
            .file_descriptor_proto()
            .dependency
            .iter()
            .map(|target| (self.main_name.clone(), target.clone()))
            .collect();

        while let Some((origin, target)) = pending.pop_front() {
            let name = self.imports.resolve_path(&origin, &target);
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(file) = self.load_import(&name) else {
                continue;
            };
            let descriptor = file.file_descriptor_proto();
            pending.extend(
                descriptor
                    .dependency
                    .iter()
                    .map(|target| (name.clone(), target.clone())),
            );
            builder.add_file(descriptor);
        }

        Ok(builder.finish())
    }

    fn load_import(&self, name: &str) -> Option<File> {
        let err = match self.imports.fetch(name) {
            Ok(source) => {
                return match File::from_source(name, source) {
                    Ok(file) => {
                        tracing::debug!(import = name, "import loaded");
                        Some(file)
                    }
                    Err(err) => {
                        tracing::warn!(
                            import = name,
                            error = %err,
                            "import failed to parse, skipping"
                        );
                        None
                    }
                };
            }
            Err(err) => err,
        };

        if name.starts_with("google/protobuf/") {
            if let Ok(file) = GoogleFileResolver::new().open_file(name) {
                tracing::debug!(import = name, "import served from well-known types");
                return Some(file);
            }
        }

        tracing::warn!(error = %err, "types from this import will be unresolved");
        None
    }
}
