//! AMD register reference (PPR/BKDG) layout.
//!
//! AMD documents each MSR as a block: a header line (`MSRC001_0015 [Hardware Configuration]
//! (Core::X86::Msr::HWCR)`), some prose, then a `Bits Description` table whose rows start with a
//! bit range. Blocks follow each other without separators, and the last block of a chapter is only
//! terminated by the page/section whitespace that follows it.

use std::sync::OnceLock;

use regex::Regex;

use crate::bits::{parse_bit_range, substitute_maxphyaddr};
use crate::registry::{RawRegisterBlock, Registry};
use crate::{ParseOptions, Step};

/// More blank lines than this inside an open block ends the block.
pub const BLANK_LINE_LIMIT: usize = 10;

const BITS_TABLE_MARKER: &str = "Bits Description";
const RESERVED_MARKER: &str = "Reserved.";
const ALIAS_MARKERS: [&str; 2] = ["is an alias of", "is aliased to"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmdState {
    /// No block open.
    Scanning,
    /// Block open, before its bit table.
    InHeader,
    /// Block open, collecting bit-table rows.
    InBitsTable,
}

/// Classification of one input line, as seen from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmdLine {
    /// Cross-reference to another register's documentation.
    Alias,
    Header { address: String, name: String },
    BitsMarker,
    BitRow { token: String, reserved: bool },
    Blank,
    Other,
}

struct Patterns {
    header: Regex,
    bit_row: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // `MSRC001_0030...MSRC001_0035 [Name]` documents a run of MSRs in one block.
        header: Regex::new(
            r"^\s*MSR(?P<first>[0-9A-F]+_[0-9A-F]+)(?:\.\.\.(?:MSR)?(?P<last>[0-9A-F]+(?:_[0-9A-F]+)?))?\s+(?P<name>.*)$",
        )
        .expect("static regex must compile"),
        bit_row: Regex::new(r"^\s*(\d+(?::\d+)?)").expect("static regex must compile"),
    })
}

/// Classify `line` given the extractor state `state`.
///
/// Patterns are tried in priority order: alias cross-references, register headers, then (only with
/// a block open) the bit-table marker, bit rows and blank lines.
pub fn classify(line: &str, state: AmdState) -> AmdLine {
    if ALIAS_MARKERS.iter().any(|marker| line.contains(marker)) {
        return AmdLine::Alias;
    }

    let patterns = patterns();
    if let Some(caps) = patterns.header.captures(line) {
        let mut address = caps["first"].to_string();
        if let Some(last) = caps.name("last") {
            address.push_str("...");
            address.push_str(last.as_str());
        }
        address.retain(|c| c != '_');
        return AmdLine::Header {
            address,
            name: caps["name"].trim_end().to_string(),
        };
    }

    if state == AmdState::Scanning {
        return AmdLine::Other;
    }

    if line.contains(BITS_TABLE_MARKER) {
        return AmdLine::BitsMarker;
    }

    if state == AmdState::InBitsTable {
        let line = substitute_maxphyaddr(line);
        if let Some(caps) = patterns.bit_row.captures(&line) {
            return AmdLine::BitRow {
                token: caps[1].trim().to_string(),
                reserved: line.contains(RESERVED_MARKER),
            };
        }
    }

    if line.is_empty() {
        AmdLine::Blank
    } else {
        AmdLine::Other
    }
}

/// Line-driven extractor for AMD register blocks.
#[derive(Debug)]
pub struct AmdExtractor {
    opts: ParseOptions,
    state: AmdState,
    pending: Option<RawRegisterBlock>,
    registry: Registry,
    blank_lines: usize,
    line_no: usize,
}

impl AmdExtractor {
    pub fn new(opts: ParseOptions) -> Self {
        Self {
            opts,
            state: AmdState::Scanning,
            pending: None,
            registry: Registry::new(),
            blank_lines: 0,
            line_no: 0,
        }
    }

    pub fn state(&self) -> AmdState {
        self.state
    }

    /// Blank lines seen since the current block was opened.
    pub fn blank_lines(&self) -> usize {
        self.blank_lines
    }

    pub fn pending(&self) -> Option<&RawRegisterBlock> {
        self.pending.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lines fed through [`step`](Self::step) so far.
    pub fn lines_seen(&self) -> usize {
        self.line_no
    }

    /// Feed one line.
    pub fn step(&mut self, line: &str) -> Step {
        self.line_no += 1;

        match classify(line, self.state) {
            AmdLine::Alias | AmdLine::Other => Step::Ignored,
            AmdLine::Header { address, name } => {
                let reopened = self.close();
                tracing::debug!(line_no = self.line_no, %address, %name, "AMD register block");
                self.pending = Some(RawRegisterBlock::new(name, address));
                self.state = AmdState::InHeader;
                if reopened {
                    Step::Reopened
                } else {
                    Step::Opened
                }
            }
            AmdLine::BitsMarker => {
                self.state = AmdState::InBitsTable;
                Step::EnteredBits
            }
            AmdLine::BitRow { token, reserved } => {
                if self.opts.reserved && !reserved {
                    return Step::Ignored;
                }
                match parse_bit_range(&token) {
                    Ok(range) => {
                        tracing::trace!(line_no = self.line_no, %range, "captured bit range");
                        if let Some(block) = self.pending.as_mut() {
                            block.bit_ranges.push(range);
                        }
                        Step::Captured(range)
                    }
                    Err(err) => {
                        tracing::warn!(line_no = self.line_no, "skipping row: {err}");
                        Step::Skipped
                    }
                }
            }
            AmdLine::Blank => {
                self.blank_lines += 1;
                if self.blank_lines > BLANK_LINE_LIMIT {
                    self.close();
                    Step::Closed
                } else {
                    Step::Ignored
                }
            }
        }
    }

    /// Close the open block (if any) and return everything collected.
    pub fn finish(mut self) -> Registry {
        self.close();
        self.registry
    }

    fn close(&mut self) -> bool {
        self.state = AmdState::Scanning;
        self.blank_lines = 0;
        let Some(block) = self.pending.take() else {
            return false;
        };
        tracing::debug!(
            line_no = self.line_no,
            address = %block.address,
            ranges = block.bit_ranges.len(),
            "closed AMD register block"
        );
        self.registry.insert(block);
        true
    }
}
