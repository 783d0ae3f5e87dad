//! Extraction of MSR metadata (name, address, reserved-bit mask) from text dumps of CPU vendor
//! manuals.
//!
//! The input is the plain text of an AMD or Intel register reference, already converted from PDF
//! by an external tool, plus a vendor hint. Each vendor has its own line-driven state machine
//! ([`amd::AmdExtractor`], [`intel::IntelExtractor`]) that collects raw register blocks into a
//! [`Registry`]; the registry is then folded into one [`CombinedRecord`] per register.
//!
//! ```
//! use msr_doc_parser::{parse_lines, ParseOptions, Vendor};
//!
//! let lines = ["MSR0000_0010 TSC", "Bits Description", "63:0 Time Stamp Counter"];
//! let records = parse_lines(lines, Vendor::Amd, ParseOptions::default()).unwrap();
//! assert_eq!(records[0].name, "TSC");
//! assert_eq!(records[0].address, "0x00000010");
//! assert_eq!(records[0].reserved_mask, u64::MAX);
//! ```
//!
//! Every call owns its extractor state and registry, so documents can be parsed concurrently
//! without coordination.

pub mod amd;
pub mod bits;
pub mod error;
pub mod intel;
pub mod registry;

use std::fmt;
use std::str::FromStr;

pub use crate::bits::{combine_masks, parse_bit_range, BitRange};
pub use crate::error::{ParseError, Result};
pub use crate::registry::{AddressGroup, CombinedRecord, RawRegisterBlock, Registry};

use crate::amd::AmdExtractor;
use crate::intel::IntelExtractor;

/// Document layout to parse. Decided by the caller (e.g. from PDF metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Amd,
    Intel,
}

impl Vendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Amd => "AMD",
            Vendor::Intel => "Intel",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("amd") {
            Ok(Vendor::Amd)
        } else if s.eq_ignore_ascii_case("intel") {
            Ok(Vendor::Intel)
        } else {
            Err(ParseError::UnknownVendor(s.to_string()))
        }
    }
}

/// Options shared by both extractors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keep only bit ranges whose row is annotated as reserved. When unset, every described
    /// range contributes to the mask.
    pub reserved: bool,
}

/// Side effect of feeding one line to an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Prose, footnotes, filtered rows and anything else with no effect.
    Ignored,
    /// A register block was opened.
    Opened,
    /// The open block was closed and a new one opened on the same line.
    Reopened,
    /// The open block was closed without a successor.
    Closed,
    /// The bit-description table of the open block starts.
    EnteredBits,
    /// The first MSR table header was seen.
    EnteredTable,
    Captured(BitRange),
    /// A bit row whose range token did not parse.
    Skipped,
    /// A wrapped address was started.
    ContinuationPending,
    ContinuationCompleted,
}

/// Run the vendor extractor over `lines` and return the raw blocks grouped by address.
pub fn extract_registry<I, S>(lines: I, vendor: Vendor, opts: ParseOptions) -> Result<Registry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extract(lines, vendor, opts).map(|(registry, _)| registry)
}

/// Like [`extract_registry`], also returning the number of lines consumed.
fn extract<I, S>(lines: I, vendor: Vendor, opts: ParseOptions) -> Result<(Registry, usize)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match vendor {
        Vendor::Amd => {
            let mut extractor = AmdExtractor::new(opts);
            for line in lines {
                extractor.step(line.as_ref());
            }
            let line_count = extractor.lines_seen();
            Ok((extractor.finish(), line_count))
        }
        Vendor::Intel => {
            let mut extractor = IntelExtractor::new(opts);
            for line in lines {
                extractor.step(line.as_ref())?;
            }
            let line_count = extractor.lines_seen();
            Ok((extractor.finish()?, line_count))
        }
    }
}

/// Parse a document given as lines into combined records.
pub fn parse_lines<I, S>(lines: I, vendor: Vendor, opts: ParseOptions) -> Result<Vec<CombinedRecord>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (registry, line_count) = extract(lines, vendor, opts)?;
    let groups = registry.len();
    let records = registry.into_records();
    tracing::info!(
        %vendor,
        lines = line_count,
        groups,
        records = records.len(),
        "parsed register document"
    );
    Ok(records)
}

/// Parse a whole text dump. Lines are split with [`str::lines`], so `\r\n` input is accepted.
pub fn parse_text(text: &str, vendor: Vendor, opts: ParseOptions) -> Result<Vec<CombinedRecord>> {
    parse_lines(text.lines(), vendor, opts)
}
