//! twirp-template-gen: print request templates for the RPC methods in a proto file
//!
//! Reads one proto source plus any number of import files or directories and
//! writes, as JSON:
//! - the full method catalog (templates, optional paths, method metadata)
//! - or only the templates per method
//! - or only the optional field paths per method

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use twirp_template::{
    CatalogBuilder, ImportSet, KeyStyle, MethodCatalog, SchemaResolver, TemplateOptions, options,
    scan,
};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "twirp-template-gen")]
#[command(about = "Generate JSON request templates for the RPC methods in a proto file")]
struct Args {
    /// Proto file declaring the services
    input: PathBuf,

    /// Import files, or directories searched for *.proto files
    #[arg(short = 'I', long = "import")]
    imports: Vec<PathBuf>,

    /// What to print
    #[arg(long, value_enum, default_value_t = Mode::Catalog)]
    mode: Mode,

    /// Only print the given method (bare or qualified name)
    #[arg(long)]
    method: Option<String>,

    /// Key methods by `<package>.<Service>.<Method>`
    #[arg(long)]
    qualified: bool,

    /// Message nesting bound for recursive types
    #[arg(long, default_value_t = options::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Times one message type may appear along a single path
    #[arg(long, default_value_t = options::DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,

    /// Message objects one request template may expand in total
    #[arg(long, default_value_t = options::DEFAULT_EXPANSION_LIMIT)]
    expansion_limit: usize,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Templates, optional paths and method metadata
    Catalog,
    /// Request templates only
    Templates,
    /// Optional field paths only
    Optional,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let imports = load_imports(&args.imports)?;
    tracing::info!(count = imports.len(), "loaded import files");

    let schema = SchemaResolver::new(&imports)
        .main_name(args.input.to_string_lossy())
        .resolve(&source)?;
    let explicit = scan(&source);

    let mut catalog = CatalogBuilder::new(&schema, &explicit)
        .options(args.template_options())
        .build();

    if let Some(method) = &args.method {
        select_method(&mut catalog, method);
        if catalog.is_empty() {
            bail!("no method named {method} in {}", args.input.display());
        }
    }

    let rendered = serde_json::to_string_pretty(&render(&catalog, args.mode)?)?;
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} methods to {}", catalog.len(), path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

impl Args {
    fn template_options(&self) -> TemplateOptions {
        let key_style = if self.qualified {
            KeyStyle::Qualified
        } else {
            KeyStyle::Method
        };
        TemplateOptions::default()
            .max_depth(self.max_depth)
            .recursion_limit(self.recursion_limit)
            .expansion_limit(self.expansion_limit)
            .key_style(key_style)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Collect import sources from files and directory trees
fn load_imports(paths: &[PathBuf]) -> anyhow::Result<ImportSet> {
    let mut imports = ImportSet::new();
    for path in paths {
        if !path.is_dir() {
            let source = read_source(path)?;
            imports.insert(path.to_string_lossy(), source);
            continue;
        }

        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            let file = entry.path();
            if !entry.file_type().is_file() || file.extension().is_none_or(|ext| ext != "proto") {
                continue;
            }
            let source = read_source(file)?;
            if let Ok(relative) = file.strip_prefix(path) {
                imports.insert(relative.to_string_lossy(), source.clone());
            }
            imports.insert(file.to_string_lossy(), source);
        }
    }
    Ok(imports)
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    tracing::debug!(path = %path.display(), "reading import");
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Keep entries whose key or bare method name is `method`
fn select_method(catalog: &mut MethodCatalog, method: &str) {
    catalog.retain(|key, entry| key == method || entry.name == method);
}

fn render(catalog: &MethodCatalog, mode: Mode) -> serde_json::Result<Value> {
    match mode {
        Mode::Catalog => serde_json::to_value(catalog),
        Mode::Templates => serde_json::to_value(catalog.templates()),
        Mode::Optional => serde_json::to_value(catalog.optional_fields()),
    }
}
