use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;
use std::thread;
use tracepack::cli::{Cli, Command, OutputFormat};
use tracepack::codec::encode_to_vec;
use tracepack::config::TracepackConfig;
use tracepack::event::EventRecord;
use tracepack::interchange::RecordRepr;
use tracepack::ring_buffer::RecordRingBuffer;
use tracepack::stats::StorageStats;
use tracepack::trace_file::{MappedTraceFile, TraceFileWriter};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Convert a JSON array of records into a trace file
///
/// All records are validated before the output file is created.
fn pack(input: &Path, output: &Path, config: &TracepackConfig) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let reprs: Vec<RecordRepr> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse records from {}", input.display()))?;

    let records = reprs
        .iter()
        .enumerate()
        .map(|(i, repr)| {
            repr.to_record(config.truncation)
                .with_context(|| format!("Invalid record at index {}", i))
        })
        .collect::<Result<Vec<EventRecord>>>()?;

    let writer = TraceFileWriter::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let buffer = RecordRingBuffer::new(writer, config.ring_buffer);
    for record in records {
        let mut pending = record;
        while let Err(record) = buffer.try_push(pending) {
            pending = record;
            thread::yield_now();
        }
    }

    let (writer, stats) = buffer
        .shutdown()
        .with_context(|| format!("Failed to write {}", output.display()))?;
    let written = writer.records_written();
    writer.into_inner()?;

    tracing::info!(
        "Packed {} records into {} ({} dropped)",
        written,
        output.display(),
        stats.total_dropped
    );
    Ok(())
}

fn format_text(record: &EventRecord) -> String {
    let storage = if record.is_inline() { "inline" } else { "external" };
    let values: Vec<String> = record.elements().map(|v| v.to_string()).collect();
    format!(
        "ts={} dur={} type={} {} {} len={} [{}]",
        record.timestamp(),
        record.duration(),
        record.type_index(),
        record.width(),
        storage,
        record.len(),
        values.join(", ")
    )
}

/// Print every record of a trace file
fn dump(file: &Path, format: OutputFormat) -> Result<()> {
    let trace = MappedTraceFile::open(file)
        .with_context(|| format!("Failed to open trace file {}", file.display()))?;

    for (i, record) in trace.records().enumerate() {
        let record = record.with_context(|| format!("Failed to decode record {}", i))?;
        match format {
            OutputFormat::Text => println!("{}", format_text(&record)),
            OutputFormat::Json => println!("{}", serde_json::to_string(&RecordRepr::from(&record))?),
            OutputFormat::Hex => println!("{}", hex::encode(encode_to_vec(&record))),
        }
    }
    Ok(())
}

/// Summarize payload storage of a trace file
fn stats(file: &Path, json: bool) -> Result<()> {
    let trace = MappedTraceFile::open(file)
        .with_context(|| format!("Failed to open trace file {}", file.display()))?;

    let mut stats = StorageStats::new();
    for (i, record) in trace.records().enumerate() {
        let record = record.with_context(|| format!("Failed to decode record {}", i))?;
        stats.record(&record);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        stats.print_summary();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => TracepackConfig::from_file(path)?,
        None => TracepackConfig::default(),
    };
    if let Some(truncation) = args.truncation {
        config.truncation = truncation;
    }
    tracing::debug!("Effective configuration: {:?}", config);

    match &args.command {
        Command::Pack { input, output } => pack(input, output, &config),
        Command::Dump { file, format } => dump(file, *format),
        Command::Stats { file, json } => stats(file, *json),
    }
}
