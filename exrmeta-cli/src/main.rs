#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::doc_markdown,
    clippy::uninlined_format_args,
    clippy::match_same_arms,
    clippy::needless_pass_by_value
)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use exrmeta::file::is_exr;
use exrmeta::standard::STANDARD_ATTRIBUTES;
use exrmeta::{
    check_header, read_file_headers, Attribute, FileVersion, Header, HeaderRead, ImfError,
    OpaqueAttribute, ReadOptions, TypeRegistry,
};

/// exrmeta CLI tools
#[derive(Parser)]
#[command(name = "exrmeta")]
#[command(about = "exrmeta CLI tools - inspect, validate, build and rewrite EXR header attributes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the attributes of an EXR file or header blob
    Inspect {
        /// EXR file or header blob to inspect
        file: PathBuf,
        /// Output format (json, yaml, toml)
        #[arg(short, long, default_value = "json")]
        format: InspectFormat,
        /// Pretty print output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Decode every attribute and report documented-convention advisories
    Validate {
        /// EXR file or header blob to validate
        file: PathBuf,
        /// Fail when any advisory is reported
        #[arg(long)]
        strict: bool,
        /// Abort on the first attribute that cannot be decoded
        #[arg(long)]
        pedantic: bool,
    },
    /// Build a header blob from a JSON, YAML or TOML description
    Build {
        /// Description file, format chosen by extension
        spec: PathBuf,
        /// Output header blob
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode and re-encode a header blob
    Rewrite {
        /// Input header blob
        input: PathBuf,
        /// Output header blob
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Copy the header of one part of an EXR file into a header blob
    Extract {
        /// EXR file to extract from
        file: PathBuf,
        /// Output header blob
        #[arg(short, long)]
        output: PathBuf,
        /// Part index for multi-part files
        #[arg(long, default_value = "0")]
        part: usize,
    },
    /// List registered value types and standard attributes
    Types,
}

#[derive(clap::ValueEnum, Clone)]
enum InspectFormat {
    Json,
    Yaml,
    Toml,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{count} attribute(s) could not be decoded")]
    DecodeFailures { count: usize },

    #[error("{count} advisory finding(s) in strict mode")]
    Advisories { count: usize },

    #[error("Part {part} requested, file has {count} part(s)")]
    PartOutOfRange { part: usize, count: usize },

    #[error("{0} is an EXR file; this command works on header blobs")]
    NotABlob(PathBuf),
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.quiet {
        log::LevelFilter::Error
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Run command
    if let Err(e) = run(args) {
        error!("Command failed: {:#}", e);

        // Map to appropriate exit codes
        let exit_code = match (e.downcast_ref::<ImfError>(), e.downcast_ref::<CliError>()) {
            (Some(ImfError::InvalidFormat(_) | ImfError::Io(_)), _) => 1,
            (Some(ImfError::AttributeTooLarge { .. }), _) => 1,
            (Some(ImfError::Decode { .. }), _) => 3,
            (_, Some(CliError::DecodeFailures { .. } | CliError::Advisories { .. })) => 3,
            _ if e.downcast_ref::<std::io::Error>().is_some() => 1,
            _ => 2,
        };

        process::exit(exit_code);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Inspect {
            file,
            format,
            pretty,
        } => cmd_inspect(file, format, pretty),
        Commands::Validate {
            file,
            strict,
            pedantic,
        } => cmd_validate(file, strict, pedantic),
        Commands::Build { spec, output } => cmd_build(spec, output),
        Commands::Rewrite { input, output } => cmd_rewrite(input, output),
        Commands::Extract { file, output, part } => cmd_extract(file, output, part),
        Commands::Types => cmd_types(),
    }
}

/// Headers read from an EXR file or a header blob
struct Loaded {
    version: Option<FileVersion>,
    parts: Vec<HeaderRead>,
}

fn load(path: &Path, registry: &TypeRegistry, options: &ReadOptions) -> Result<Loaded> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if is_exr(&bytes) {
        let headers = read_file_headers(&mut bytes.as_slice(), registry, options)?;
        Ok(Loaded {
            version: Some(headers.version),
            parts: headers.parts,
        })
    } else {
        let read = Header::from_bytes(&bytes, registry, options)?;
        Ok(Loaded {
            version: None,
            parts: vec![read],
        })
    }
}

#[derive(Serialize)]
struct Report {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    parts: Vec<PartReport>,
}

#[derive(Serialize)]
struct PartReport {
    attributes: Vec<AttributeReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Serialize)]
struct AttributeReport {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opaque: Option<OpaqueReport>,
    /// Why the value has no text form, e.g. a NaN float
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct OpaqueReport {
    size: usize,
    crc32: String,
}

fn describe(name: &str, attribute: &dyn Attribute) -> AttributeReport {
    let mut report = AttributeReport {
        name: name.to_string(),
        type_name: attribute.type_name().to_string(),
        value: None,
        opaque: None,
        error: None,
    };
    if attribute.is_opaque() {
        report.opaque = Some(OpaqueReport {
            size: attribute.to_bytes().len(),
            crc32: format!("{:08x}", attribute.checksum()),
        });
        return report;
    }
    match attribute.to_json() {
        Ok(value) => report.value = Some(value),
        Err(e) => {
            warn!("No text form for attribute {}: {}", name, e);
            report.error = Some(e.to_string());
        }
    }
    report
}

fn cmd_inspect(file: PathBuf, format: InspectFormat, pretty: bool) -> Result<()> {
    info!("Inspecting {}", file.display());

    let registry = TypeRegistry::with_standard_types();
    let loaded = load(&file, &registry, &ReadOptions::default())?;

    let mut parts = Vec::with_capacity(loaded.parts.len());
    for part in &loaded.parts {
        let attributes = part
            .header
            .iter()
            .map(|attribute| describe(attribute.name, attribute.attribute))
            .collect();
        parts.push(PartReport {
            attributes,
            errors: part.errors.iter().map(ToString::to_string).collect(),
        });
    }
    let report = Report {
        file: file.display().to_string(),
        version: loaded.version.map(|version| version.to_string()),
        parts,
    };

    let output = match format {
        InspectFormat::Json => {
            if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            }
        }
        InspectFormat::Yaml => serde_yaml::to_string(&report)?,
        InspectFormat::Toml => toml::to_string_pretty(&report)?,
    };

    println!("{}", output);
    Ok(())
}

fn cmd_validate(file: PathBuf, strict: bool, pedantic: bool) -> Result<()> {
    info!("Validating {}", file.display());

    let registry = TypeRegistry::with_standard_types();
    let options = ReadOptions {
        pedantic,
        ..ReadOptions::default()
    };
    let loaded = load(&file, &registry, &options)?;

    let mut failures = 0;
    let mut advisories = 0;
    for (index, part) in loaded.parts.iter().enumerate() {
        for error in &part.errors {
            println!("part {}: error: {}", index, error);
        }
        failures += part.errors.len();

        for advisory in check_header(&part.header) {
            println!("part {}: advisory: {}", index, advisory);
            advisories += 1;
        }
    }

    if failures > 0 {
        return Err(CliError::DecodeFailures { count: failures }.into());
    }
    if strict && advisories > 0 {
        return Err(CliError::Advisories { count: advisories }.into());
    }

    info!(
        "✓ {} part(s) decoded, {} advisory finding(s)",
        loaded.parts.len(),
        advisories
    );
    Ok(())
}

/// Text description of a header for `build`
#[derive(Debug, Deserialize)]
struct BuildSpec {
    attributes: Vec<BuildAttribute>,
}

#[derive(Debug, Deserialize)]
struct BuildAttribute {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    value: serde_json::Value,
}

fn parse_build_spec(path: &Path) -> Result<BuildSpec> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let spec: BuildSpec = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&text)?,
        Some("toml") => toml::from_str(&text)?,
        _ => serde_json::from_str(&text)?,
    };
    Ok(spec)
}

fn build_header(spec: BuildSpec, registry: &TypeRegistry) -> Result<Header> {
    let mut header = Header::new();
    for entry in spec.attributes {
        let mut attribute: Box<dyn Attribute> = match registry.construct(&entry.type_name) {
            Some(holder) => holder,
            None => {
                warn!(
                    "Type {} is not registered; {} must be given as raw bytes",
                    entry.type_name, entry.name
                );
                Box::new(OpaqueAttribute::new(entry.type_name.clone(), Vec::new()))
            }
        };
        attribute
            .set_json(entry.value)
            .with_context(|| format!("value of {}", entry.name))?;
        header.insert_attribute(&entry.name, attribute)?;
    }
    Ok(header)
}

fn cmd_build(spec: PathBuf, output: PathBuf) -> Result<()> {
    info!("Building {} from {}", output.display(), spec.display());

    let registry = TypeRegistry::with_standard_types();
    let header = build_header(parse_build_spec(&spec)?, &registry)?;
    fs::write(&output, header.to_bytes()?)?;

    info!("Wrote {} attribute(s)", header.len());
    Ok(())
}

fn cmd_rewrite(input: PathBuf, output: PathBuf) -> Result<()> {
    info!("Rewriting {} to {}", input.display(), output.display());

    let bytes = fs::read(&input)?;
    if is_exr(&bytes) {
        return Err(CliError::NotABlob(input).into());
    }

    let registry = TypeRegistry::with_standard_types();
    let read = Header::from_bytes(&bytes, &registry, &ReadOptions::default())?;
    for error in &read.errors {
        warn!("Kept undecodable attribute as raw bytes: {}", error);
    }
    let rewritten = read.header.to_bytes()?;
    fs::write(&output, &rewritten)?;

    if rewritten == bytes {
        info!("✓ Output is byte-identical to the input");
    } else {
        info!(
            "Output differs from the input ({} -> {} bytes)",
            bytes.len(),
            rewritten.len()
        );
    }
    Ok(())
}

fn cmd_extract(file: PathBuf, output: PathBuf, part: usize) -> Result<()> {
    info!("Extracting part {} of {}", part, file.display());

    let registry = TypeRegistry::with_standard_types();
    let loaded = load(&file, &registry, &ReadOptions::default())?;
    let count = loaded.parts.len();
    let read = loaded
        .parts
        .into_iter()
        .nth(part)
        .ok_or(CliError::PartOutOfRange { part, count })?;

    fs::write(&output, read.header.to_bytes()?)?;
    info!(
        "Extracted {} attribute(s) to {}",
        read.header.len(),
        output.display()
    );
    Ok(())
}

fn cmd_types() -> Result<()> {
    let registry = TypeRegistry::with_standard_types();

    println!("Value types:");
    for type_name in registry.type_names() {
        println!("  {}", type_name);
    }

    println!("Standard attributes:");
    for entry in STANDARD_ATTRIBUTES {
        match entry.deprecated {
            Some(note) => println!("  {} ({}, deprecated: {})", entry.name, entry.type_name, note),
            None => println!("  {} ({})", entry.name, entry.type_name),
        }
    }
    Ok(())
}
