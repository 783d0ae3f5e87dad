//! Per-parse accumulation of register blocks, and the fold into [`CombinedRecord`]s.
//!
//! Vendors document "multi-bank" registers as several blocks under one address, each listing a
//! different set of bit fields. The [`Registry`] groups closed blocks by their raw address string
//! (first-seen order) so the emitter can union every group's ranges into one mask.

use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};

use crate::bits::{combine_masks, BitRange};

/// One register block as it was read from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRegisterBlock {
    pub name: String,
    /// Raw address digits as extracted (no `0x` prefix, no normalization beyond what the vendor
    /// extractor applied).
    pub address: String,
    pub bit_ranges: Vec<BitRange>,
}

impl RawRegisterBlock {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            bit_ranges: Vec::new(),
        }
    }
}

impl Serialize for RawRegisterBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            name: &'a str,
            address: String,
            bits: Vec<String>,
        }

        Wire {
            name: &self.name,
            address: format!("0x{}", self.address),
            bits: self.bit_ranges.iter().map(ToString::to_string).collect(),
        }
        .serialize(serializer)
    }
}

/// All blocks that share one raw address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGroup {
    pub address: String,
    pub blocks: Vec<RawRegisterBlock>,
}

impl AddressGroup {
    /// Union of every range of every block in the group.
    pub fn combined_mask(&self) -> u64 {
        combine_masks(
            self.blocks
                .iter()
                .flat_map(|block| block.bit_ranges.iter().copied()),
        )
    }
}

/// Address-keyed collection of closed blocks, in first-seen address order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<AddressGroup>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a closed block under its address.
    ///
    /// Blocks without a name or an address carry nothing to emit and are dropped; returns whether
    /// the block was kept.
    pub fn insert(&mut self, block: RawRegisterBlock) -> bool {
        if block.name.is_empty() || block.address.is_empty() {
            return false;
        }

        match self.index.get(&block.address) {
            Some(&idx) => self.groups[idx].blocks.push(block),
            None => {
                self.index.insert(block.address.clone(), self.groups.len());
                self.groups.push(AddressGroup {
                    address: block.address.clone(),
                    blocks: vec![block],
                });
            }
        }
        true
    }

    pub fn groups(&self) -> &[AddressGroup] {
        &self.groups
    }

    pub fn get(&self, address: &str) -> Option<&AddressGroup> {
        self.index.get(address).map(|&idx| &self.groups[idx])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every block, group by group.
    pub fn blocks(&self) -> impl Iterator<Item = &RawRegisterBlock> {
        self.groups.iter().flat_map(|group| group.blocks.iter())
    }

    /// Fold the registry into output records.
    ///
    /// Each address group yields one record per distinct register name (first occurrence wins),
    /// all carrying the group's combined mask.
    pub fn into_records(self) -> Vec<CombinedRecord> {
        let mut out = Vec::new();
        for group in self.groups {
            let mask = group.combined_mask();
            let address = format!("0x{}", group.address);
            let mut seen = HashSet::new();
            for block in group.blocks {
                if !seen.insert(block.name.clone()) {
                    continue;
                }
                out.push(CombinedRecord {
                    name: block.name,
                    address: address.clone(),
                    reserved_mask: mask,
                });
            }
        }
        out
    }
}

/// Final per-register output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedRecord {
    pub name: String,
    /// `"0x"` followed by the raw extracted address.
    pub address: String,
    #[serde(serialize_with = "serialize_hex_u64")]
    pub reserved_mask: u64,
}

impl CombinedRecord {
    /// `reserved_mask` as written in the serialized record (`0x`-prefixed, lowercase, unpadded).
    pub fn reserved_mask_hex(&self) -> String {
        format!("{:#x}", self.reserved_mask)
    }
}

fn serialize_hex_u64<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:#x}"))
}
