//! Intel SDM volume 4 ("Model-Specific Registers") layout.
//!
//! The MSR tables have the columns `Address (Hex) | Address (Dec) | Register Name | Scope | Bit
//! Description`. Flattened to text, a register starts with a row like
//! `1BH 27 IA32_APIC_BASE Unique ...` and is followed by one row per bit field
//! (`63:MAXPHYADDR Reserved`). Long hex addresses in narrow columns wrap onto the next line:
//!
//! ```text
//! C000_     IA32_EFER           Unique   Extended Feature Enables
//! 0080H
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::bits::{parse_bit_range, substitute_maxphyaddr};
use crate::error::{ParseError, Result};
use crate::registry::{RawRegisterBlock, Registry};
use crate::{ParseOptions, Step};

const TABLE_MARKERS: [&str; 2] = ["Register Name", "MSR Name"];
const RESERVED_MARKER: &str = "Reserved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntelState {
    /// Front matter before the first MSR table header.
    BeforeTable,
    InTable,
    /// A wrapped address was started; the next line must finish it.
    AwaitingAddressContinuation,
}

/// Classification of one input line, as seen from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntelLine {
    TableStart,
    Header { address: String, name: String },
    ContinuationStart { prefix: String, name: String },
    ContinuationSuffix { suffix: String },
    BitRow { token: String, reserved: bool },
    Other,
}

struct Patterns {
    header: Regex,
    continuation_start: Regex,
    continuation_suffix: Regex,
    bit_row: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(r"^\s*([0-9A-F]+)H\s+\d+\s+(\S+)(?:\s.*)?$")
            .expect("static regex must compile"),
        continuation_start: Regex::new(r"^\s*([0-9A-F]+)_\s*((?:IA32_|MSR_)\S*)(?:\s.*)?$")
            .expect("static regex must compile"),
        continuation_suffix: Regex::new(r"^\s*([0-9A-F]+)H").expect("static regex must compile"),
        // The SDM sometimes puts a space on either side of the colon (`63: 40`).
        bit_row: Regex::new(r"^\s*(\d+(?: ?: ?\d+)?)\s").expect("static regex must compile"),
    })
}

/// Classify `line` given the extractor state `state`.
pub fn classify(line: &str, state: IntelState) -> IntelLine {
    let patterns = patterns();

    // Page breaks repeat the table header, even between the halves of a wrapped address.
    if TABLE_MARKERS.iter().any(|marker| line.contains(marker)) {
        return IntelLine::TableStart;
    }

    if state == IntelState::AwaitingAddressContinuation {
        return match patterns.continuation_suffix.captures(line) {
            Some(caps) => IntelLine::ContinuationSuffix {
                suffix: caps[1].to_string(),
            },
            None => IntelLine::Other,
        };
    }

    if state == IntelState::BeforeTable {
        return IntelLine::Other;
    }

    if let Some(caps) = patterns.header.captures(line) {
        return IntelLine::Header {
            address: caps[1].to_string(),
            name: caps[2].to_string(),
        };
    }

    if let Some(caps) = patterns.continuation_start.captures(line) {
        return IntelLine::ContinuationStart {
            prefix: caps[1].to_string(),
            name: caps[2].to_string(),
        };
    }

    let line = substitute_maxphyaddr(line);
    if let Some(caps) = patterns.bit_row.captures(&line) {
        let mut token = caps[1].to_string();
        token.retain(|c| !c.is_whitespace());
        return IntelLine::BitRow {
            token,
            reserved: line.contains(RESERVED_MARKER),
        };
    }

    IntelLine::Other
}

/// Line-driven extractor for Intel MSR tables.
#[derive(Debug)]
pub struct IntelExtractor {
    opts: ParseOptions,
    state: IntelState,
    pending: Option<RawRegisterBlock>,
    registry: Registry,
    line_no: usize,
}

impl IntelExtractor {
    pub fn new(opts: ParseOptions) -> Self {
        Self {
            opts,
            state: IntelState::BeforeTable,
            pending: None,
            registry: Registry::new(),
            line_no: 0,
        }
    }

    pub fn state(&self) -> IntelState {
        self.state
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
    ///
    /// Fails with [`ParseError::BrokenAddressContinuation`] when a wrapped address is not finished
    /// by the following line; the extractor must not be used after that.
    pub fn step(&mut self, line: &str) -> Result<Step> {
        self.line_no += 1;

        let step = match classify(line, self.state) {
            IntelLine::TableStart => {
                if self.state == IntelState::BeforeTable {
                    tracing::debug!(line_no = self.line_no, "entered Intel MSR table");
                    self.state = IntelState::InTable;
                    Step::EnteredTable
                } else {
                    // Repeated page header; a pending wrapped address stays pending.
                    Step::Ignored
                }
            }
            IntelLine::Header { address, name } => self.open(name, address),
            IntelLine::ContinuationStart { prefix, name } => {
                self.open(name, prefix);
                self.state = IntelState::AwaitingAddressContinuation;
                Step::ContinuationPending
            }
            IntelLine::ContinuationSuffix { suffix } => {
                if let Some(block) = self.pending.as_mut() {
                    block.address.push_str(&suffix);
                    tracing::debug!(
                        line_no = self.line_no,
                        address = %block.address,
                        "completed wrapped address"
                    );
                }
                self.state = IntelState::InTable;
                Step::ContinuationCompleted
            }
            IntelLine::Other if self.state == IntelState::AwaitingAddressContinuation => {
                return Err(self.broken_continuation());
            }
            IntelLine::BitRow { token, reserved } if self.pending.is_some() => {
                if self.opts.reserved && !reserved {
                    return Ok(Step::Ignored);
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
            IntelLine::BitRow { .. } | IntelLine::Other => Step::Ignored,
        };

        Ok(step)
    }

    /// Close the open block (if any) and return everything collected.
    pub fn finish(mut self) -> Result<Registry> {
        if self.state == IntelState::AwaitingAddressContinuation {
            self.line_no += 1;
            return Err(self.broken_continuation());
        }
        self.close();
        Ok(self.registry)
    }

    fn open(&mut self, name: String, address: String) -> Step {
        let reopened = self.close();
        tracing::debug!(line_no = self.line_no, %address, %name, "Intel register row");
        self.pending = Some(RawRegisterBlock::new(name, address));
        if reopened {
            Step::Reopened
        } else {
            Step::Opened
        }
    }

    fn close(&mut self) -> bool {
        let Some(block) = self.pending.take() else {
            return false;
        };
        tracing::debug!(
            line_no = self.line_no,
            address = %block.address,
            ranges = block.bit_ranges.len(),
            "closed Intel register block"
        );
        self.registry.insert(block);
        true
    }

    fn broken_continuation(&mut self) -> ParseError {
        // The half-read block is dropped: its address is unknown.
        let pending = self
            .pending
            .take()
            .map(|block| block.address)
            .unwrap_or_default();
        ParseError::BrokenAddressContinuation {
            line_no: self.line_no,
            pending,
        }
    }
}
