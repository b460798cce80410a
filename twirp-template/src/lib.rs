//! twirp-template
//!
//! Generates ready-to-edit JSON request templates for every RPC method in a
//! set of Protocol Buffer sources, along with the dotted paths of the fields
//! that were declared `optional`.
//!
//! ```rust,ignore
//! use twirp_template::{ImportSet, parse_method_templates, parse_optional_fields};
//!
//! let imports = ImportSet::new().with("common/money.proto", money_source);
//! let templates = parse_method_templates(main_source, &imports)?;
//! let optional = parse_optional_fields(main_source, &imports)?;
//! ```
//!
//! Pipeline: [`resolver`] links the sources into a [`ResolvedSchema`],
//! [`scanner`] finds explicit `optional` declarations in the raw text,
//! [`template`] and [`optional`] walk request types, and [`catalog`] ties it
//! together per method.

#![deny(missing_docs)]

pub mod catalog;
mod error;
pub mod imports;
pub mod optional;
pub mod options;
pub mod resolver;
pub mod scanner;
pub mod schema;
pub mod template;

pub use catalog::{
    CatalogBuilder, MethodCatalog, MethodCatalogEntry, parse_catalog, parse_method_templates,
    parse_optional_fields,
};
pub use error::{Error, Result};
pub use imports::ImportSet;
pub use optional::OptionalFieldExtractor;
pub use options::{KeyStyle, TemplateOptions};
pub use resolver::{SchemaResolver, resolve};
pub use scanner::{ExplicitOptionalPaths, scan};
pub use schema::ResolvedSchema;
pub use template::TemplateGenerator;
