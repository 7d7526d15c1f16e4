//! Command-line dataset inspector.
//!
//! Sniffs the file against every known decoder, prints the dataset
//! description as JSON, and optionally streams a record variable or reads an
//! array section.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cdm_core::{ArrayData, CdmDataset, CdmResult, FormatDecoder, RandomSource, RecordCursor, Section};
use ghcnm_parser::GhcnmDecoder;
use sigmet_parser::SigmetDecoder;

#[derive(Parser, Debug)]
#[command(name = "cdm-dump")]
#[command(about = "Describe a decodable data file and dump its contents")]
struct Args {
    /// File to inspect
    file: PathBuf,

    /// Stream a record variable, one JSON object per line
    #[arg(long)]
    records: Option<String>,

    /// Stop after this many records
    #[arg(long)]
    limit: Option<u64>,

    /// Read an array section: VAR=START:END[:STRIDE],... or just VAR for all
    #[arg(long)]
    section: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// The formats the tool knows how to open.
enum AnyDecoder {
    Ghcnm(GhcnmDecoder),
    Sigmet(SigmetDecoder),
}

impl AnyDecoder {
    fn format_name(&self) -> &'static str {
        match self {
            AnyDecoder::Ghcnm(_) => "GHCN-Monthly",
            AnyDecoder::Sigmet(_) => "SIGMET-IRIS RAW",
        }
    }

    fn dataset(&self) -> &CdmDataset {
        match self {
            AnyDecoder::Ghcnm(d) => d.dataset(),
            AnyDecoder::Sigmet(d) => d.dataset(),
        }
    }

    fn read_section(&mut self, var: &str, section: &Section) -> CdmResult<ArrayData> {
        match self {
            AnyDecoder::Ghcnm(d) => d.read_section(var, section),
            AnyDecoder::Sigmet(d) => d.read_section(var, section),
        }
    }

    fn record_cursor(&self, var: &str) -> CdmResult<Box<dyn RecordCursor>> {
        match self {
            AnyDecoder::Ghcnm(d) => d.record_cursor(var),
            AnyDecoder::Sigmet(d) => d.record_cursor(var),
        }
    }
}

/// Try each decoder's recognizer in turn.
fn open_decoder(path: &Path) -> Result<AnyDecoder> {
    let mut source = RandomSource::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    if GhcnmDecoder::is_valid_file(&mut source) {
        let decoder = GhcnmDecoder::open(source, None).context("opening as GHCN-Monthly")?;
        return Ok(AnyDecoder::Ghcnm(decoder));
    }
    if SigmetDecoder::is_valid_file(&mut source) {
        let decoder = SigmetDecoder::open(source, None).context("opening as SIGMET RAW")?;
        return Ok(AnyDecoder::Sigmet(decoder));
    }
    bail!("{}: no decoder recognizes this file", path.display());
}

fn dump_records(decoder: &AnyDecoder, var: &str, limit: Option<u64>) -> Result<()> {
    let mut cursor = decoder
        .record_cursor(var)
        .with_context(|| format!("no record stream for '{}'", var))?;
    let mut printed = 0u64;
    while cursor.has_next()? {
        if limit.is_some_and(|n| printed >= n) {
            break;
        }
        let record = cursor.next_record()?;
        let object: serde_json::Map<String, serde_json::Value> = record
            .fields()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        println!("{}", serde_json::Value::Object(object));
        printed += 1;
    }
    info!(var, records = printed, "record stream drained");
    Ok(())
}

fn dump_section(decoder: &mut AnyDecoder, spec: &str) -> Result<()> {
    let (var_name, ranges) = match spec.split_once('=') {
        Some((var, ranges)) => (var, Some(ranges)),
        None => (spec, None),
    };
    let shape = {
        let ds = decoder.dataset();
        let var = ds
            .find_variable(var_name)
            .with_context(|| format!("no variable '{}'", var_name))?;
        ds.variable_shape(var)?
    };
    let section = match ranges {
        Some(ranges) => Section::parse(ranges, &shape)
            .with_context(|| format!("bad section '{}' for shape {:?}", ranges, shape))?,
        None => Section::full(&shape)?,
    };
    let array = decoder.read_section(var_name, &section)?;
    let values = match (array.as_i32(), array.as_f32()) {
        (Some(v), _) => json!(v),
        (_, Some(v)) => json!(v),
        _ => unreachable!(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "variable": var_name,
            "shape": array.shape(),
            "values": values,
        }))?
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut decoder = open_decoder(&args.file)?;
    info!(format = decoder.format_name(), file = %args.file.display(), "opened");

    println!("{}", serde_json::to_string_pretty(decoder.dataset())?);

    if let Some(var) = &args.records {
        dump_records(&decoder, var, args.limit)?;
    }
    if let Some(spec) = &args.section {
        dump_section(&mut decoder, spec)?;
    }
    Ok(())
}
