use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use msr_doc_parser::{extract_registry, ParseOptions, Registry, Vendor};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VendorArg {
    Amd,
    Intel,
}

impl From<VendorArg> for Vendor {
    fn from(v: VendorArg) -> Self {
        match v {
            VendorArg::Amd => Vendor::Amd,
            VendorArg::Intel => Vendor::Intel,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "msr_doc_extract",
    about = "Extract MSR names, addresses and reserved-bit masks from text dumps of AMD/Intel manuals."
)]
struct Args {
    /// Text dump(s) of the manual, e.g. `pdftotext -layout` output ("-" reads stdin)
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Layout of the input documents
    #[arg(long, value_enum, env = "MSR_DOC_VENDOR")]
    vendor: VendorArg,

    /// Only count bit ranges that the manual marks as reserved
    #[arg(long, env = "MSR_DOC_RESERVED")]
    reserved: bool,

    /// Print raw register blocks (with their bit ranges) instead of combined records
    #[arg(long, action = clap::ArgAction::SetTrue)]
    raw: bool,

    /// Write JSON lines to this path instead of stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries nothing but JSON lines.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let vendor = Vendor::from(args.vendor);
    let opts = ParseOptions {
        reserved: args.reserved,
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    // Documents are independent: one that fails to parse doesn't stop the others.
    let mut failed = 0usize;
    for input in &args.inputs {
        match parse_document(input, vendor, opts) {
            Ok(registry) => write_registry(&mut out, registry, args.raw)
                .with_context(|| format!("write results for {}", input.display()))?,
            Err(err) => {
                failed += 1;
                eprintln!("error: {err:#}");
            }
        }
    }

    out.flush().context("flush output")?;

    if failed > 0 {
        bail!(
            "{failed} of {} document(s) could not be parsed",
            args.inputs.len()
        );
    }
    Ok(())
}

fn parse_document(input: &Path, vendor: Vendor, opts: ParseOptions) -> Result<Registry> {
    let text = read_input(input)?;
    let registry = extract_registry(text.lines(), vendor, opts)
        .with_context(|| format!("parse {vendor} document {}", input.display()))?;
    tracing::info!(
        input = %input.display(),
        groups = registry.len(),
        "extracted register blocks"
    );
    Ok(registry)
}

fn read_input(input: &Path) -> Result<String> {
    let bytes = if input == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("read document from stdin")?;
        buf
    } else {
        fs::read(input).with_context(|| format!("read {}", input.display()))?
    };
    // PDF text extractors occasionally emit stray non-UTF-8 bytes (ligatures, symbol fonts).
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_registry(out: &mut dyn Write, registry: Registry, raw: bool) -> Result<()> {
    if raw {
        for block in registry.blocks() {
            write_json_line(out, block)?;
        }
    } else {
        for record in registry.into_records() {
            write_json_line(out, &record)?;
        }
    }
    Ok(())
}

fn write_json_line<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}
