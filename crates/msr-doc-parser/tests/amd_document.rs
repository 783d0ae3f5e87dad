use msr_doc_parser::{extract_registry, parse_text, CombinedRecord, ParseOptions, Vendor};

const PPR: &str = include_str!("fixtures/amd_ppr.txt");

fn summary(records: &[CombinedRecord]) -> Vec<(&str, &str, String)> {
    records
        .iter()
        .map(|r| (r.name.as_str(), r.address.as_str(), r.reserved_mask_hex()))
        .collect()
}

#[test]
fn all_described_ranges() {
    let records = parse_text(PPR, Vendor::Amd, ParseOptions { reserved: false }).unwrap();
    assert_eq!(
        summary(&records),
        [
            (
                "[Time Stamp Counter] (Core::X86::Msr::TSC)",
                "0x00000010",
                "0xffffffffffffffff".to_string()
            ),
            (
                "[APIC Base Address] (Core::X86::Msr::APIC_BAR)",
                "0x0000001B",
                "0xffffffffffffffff".to_string()
            ),
            (
                "[Extended Feature Enable] (Core::X86::Msr::EFER)",
                "0xC0000080",
                "0xffffffffffffffff".to_string()
            ),
            (
                "[Processor Name String] (Core::X86::Msr::ProcNameString)",
                "0xC0010030...C0010035",
                "0xffffffffffffffff".to_string()
            ),
            (
                "[IBS Fetch Control] (Core::X86::Msr::IC_IBS_CTL)",
                "0xC0011030",
                "0xffff000000000000".to_string()
            ),
            (
                "[IBS Fetch Control Extended] (Core::X86::Msr::IC_IBS_EXT)",
                "0xC0011030",
                "0xffff000000000000".to_string()
            ),
        ]
    );
}

#[test]
fn reserved_ranges_only() {
    let records = parse_text(PPR, Vendor::Amd, ParseOptions { reserved: true }).unwrap();
    let masks: Vec<_> = records
        .iter()
        .map(|r| (r.address.as_str(), r.reserved_mask))
        .collect();
    assert_eq!(
        masks,
        [
            ("0x00000010", 0),
            ("0x0000001B", 0xffff_0000_0000_02ff),
            ("0xC0000080", 0xffff_ffff_ffff_22fe),
            ("0xC0010030...C0010035", 0),
            ("0xC0011030", 0xfdff_0000_0000_0000),
            ("0xC0011030", 0xfdff_0000_0000_0000),
        ]
    );
}

#[test]
fn multi_bank_blocks_share_one_group() {
    let registry = extract_registry(PPR.lines(), Vendor::Amd, ParseOptions { reserved: true }).unwrap();
    let group = registry.get("C0011030").unwrap();
    assert_eq!(group.blocks.len(), 3);
    assert_eq!(registry.len(), 5);

    // The alias cross-reference below the EFER header must not become its own register.
    assert!(registry.get("C0010080").is_none());
}

#[test]
fn same_name_blocks_collapse_into_one_record() {
    let lines = [
        "MSRC001_0000 MSR_FOO",
        "Bits Description",
        "3:0 Reserved.",
        "MSRC001_0000 MSR_FOO",
        "Bits Description",
        "63:60 Reserved.",
        "MSRC001_0000 MSR_BAR",
    ];
    let records =
        msr_doc_parser::parse_lines(lines, Vendor::Amd, ParseOptions { reserved: true }).unwrap();
    assert_eq!(
        records,
        [
            CombinedRecord {
                name: "MSR_FOO".into(),
                address: "0xC0010000".into(),
                reserved_mask: 0xf000_0000_0000_000f,
            },
            CombinedRecord {
                name: "MSR_BAR".into(),
                address: "0xC0010000".into(),
                reserved_mask: 0xf000_0000_0000_000f,
            },
        ]
    );
}

#[test]
fn blank_run_ends_the_chapter_block() {
    let mut lines = vec!["MSR0000_0010 TSC", "Bits Description", "63:0 Counter"];
    lines.extend(std::iter::repeat("").take(11));
    // Without the blank-line closure this row would be folded into TSC.
    lines.extend(["Bits Description", "7:0 stray row"]);

    let registry = extract_registry(lines, Vendor::Amd, ParseOptions::default()).unwrap();
    let tsc = &registry.get("00000010").unwrap().blocks[0];
    assert_eq!(tsc.bit_ranges.len(), 1);
}
