//! protoc-gen-twirp-template
//!
//! A protoc plugin writing the JSON request templates and optional field
//! paths of every service method.
//!
//! Usage:
//!   protoc --twirp-template_out=./gen proto/*.proto
//!   protoc --twirp-template_out=keys=qualified,max_depth=8:./gen proto/*.proto

#![deny(warnings)]
#![deny(missing_docs)]

use std::io::{self, Read, Write};

use prost::Message;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod generator;
mod params;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the response, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input)?;

    let response = generator::generate_from_bytes(&input);

    let mut output = Vec::new();
    response.encode(&mut output)?;
    io::stdout().write_all(&output)?;

    Ok(())
}
