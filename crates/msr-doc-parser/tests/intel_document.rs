use msr_doc_parser::{extract_registry, parse_lines, parse_text, ParseError, ParseOptions, Vendor};

const SDM: &str = include_str!("fixtures/intel_sdm.txt");

#[test]
fn reserved_masks() {
    let records = parse_text(SDM, Vendor::Intel, ParseOptions { reserved: true }).unwrap();
    let rows: Vec<_> = records
        .iter()
        .map(|r| (r.name.as_str(), r.address.as_str(), r.reserved_mask))
        .collect();
    assert_eq!(
        rows,
        [
            ("IA32_TIME_STAMP_COUNTER", "0x10", 0),
            ("IA32_APIC_BASE", "0x1B", 0x8000_0000_0000_02ff),
            ("IA32_EFER", "0xC0000080", 0xffff_ffff_ffff_f2fe),
            ("MSR_PLATFORM_INFO", "0xCE", 0xffff_0000_0fff_00ff),
        ]
    );
}

#[test]
fn all_described_ranges() {
    let records = parse_text(SDM, Vendor::Intel, ParseOptions { reserved: false }).unwrap();
    let masks: Vec<_> = records.iter().map(|r| r.reserved_mask_hex()).collect();
    assert_eq!(
        masks,
        [
            "0x0",
            "0x8000000000000fff",
            "0xffffffffffffffff",
            "0xffff00000fffffff"
        ]
    );
}

#[test]
fn front_matter_rows_are_not_registers() {
    let registry = extract_registry(SDM.lines(), Vendor::Intel, ParseOptions::default()).unwrap();
    assert_eq!(registry.get("10").unwrap().blocks.len(), 1);
    assert_eq!(registry.get("CE").unwrap().blocks.len(), 2);
}

#[test]
fn maxphyaddr_row_equals_explicit_row() {
    let with_symbol = parse_lines(
        ["Register Name", "1BH 27 IA32_APIC_BASE", "MAXPHYADDR:40 Reserved."],
        Vendor::Intel,
        ParseOptions { reserved: true },
    )
    .unwrap();
    let explicit = parse_lines(
        ["Register Name", "1BH 27 IA32_APIC_BASE", "63:40 Reserved."],
        Vendor::Intel,
        ParseOptions { reserved: true },
    )
    .unwrap();
    assert_eq!(with_symbol, explicit);
    assert_eq!(with_symbol[0].reserved_mask, 0xffff_ff00_0000_0000);
}

#[test]
fn truncated_wrapped_address_fails_the_document() {
    let broken = SDM.replace("     0080H\n", "");
    let err = parse_text(&broken, Vendor::Intel, ParseOptions::default()).unwrap_err();
    match err {
        ParseError::BrokenAddressContinuation { pending, .. } => assert_eq!(pending, "C000"),
        other => panic!("unexpected error: {other}"),
    }
}
