mod common;

use common::*;

#[test]
fn encoded_code_info_parses_back() {
    let frame = FrameInfo::new(96, 0x4ff0, 0x0300);
    let bytes = encode(
        frame,
        &[
            (0x30, 7, StackMapKind::Default),
            (0x08, 1, StackMapKind::Default),
            (0x30, 40, StackMapKind::Catch),
        ],
    );
    let info = CodeInfo::parse(&bytes).expect("code info should parse");

    assert_eq!(info.frame_info(), frame);
    assert_eq!(info.len(), 3);
    assert!(!info.is_empty());
    let maps: Vec<StackMap> = info.iter().collect();
    assert_eq!(
        maps,
        vec![
            StackMap {
                native_pc_offset: 0x08,
                guest_offset: 1,
                kind: StackMapKind::Default,
            },
            StackMap {
                native_pc_offset: 0x30,
                guest_offset: 7,
                kind: StackMapKind::Default,
            },
            StackMap {
                native_pc_offset: 0x30,
                guest_offset: 40,
                kind: StackMapKind::Catch,
            },
        ]
    );
    assert_eq!(info.stack_map(3), None);
}

#[test]
fn lookups_respect_the_stack_map_kind() {
    let bytes = encode(
        FrameInfo::new(32, 0, 0),
        &[
            (0x30, 7, StackMapKind::Default),
            (0x30, 40, StackMapKind::Catch),
            (0x50, 41, StackMapKind::Catch),
        ],
    );
    let info = CodeInfo::parse(&bytes).expect("code info should parse");

    assert_eq!(
        info.for_native_offset(0x30, StackMapKind::Default).map(|m| m.guest_offset),
        Some(7)
    );
    assert_eq!(
        info.for_native_offset(0x30, StackMapKind::Catch).map(|m| m.guest_offset),
        Some(40)
    );
    assert_eq!(info.for_native_offset(0x50, StackMapKind::Default), None);
    assert_eq!(info.for_guest_offset(41, StackMapKind::Default), None);
    assert_eq!(
        info.for_guest_offset(41, StackMapKind::Catch).map(|m| m.native_pc_offset),
        Some(0x50)
    );
}

#[test]
fn empty_code_info_has_only_a_frame() {
    let bytes = encode(FrameInfo::new(16, 1, 0), &[]);
    assert_eq!(bytes.len(), 24);
    let info = CodeInfo::parse(&bytes).expect("code info should parse");
    assert!(info.is_empty());
    assert_eq!(info.frame_info().frame_size_in_bytes, 16);
}

#[test]
fn builder_rejects_ambiguous_mappings() {
    let mut builder = CodeInfoBuilder::new();
    builder.add_stack_map(0x10, 1, StackMapKind::Default);
    builder.add_stack_map(0x10, 2, StackMapKind::Default);
    assert_eq!(
        builder.encode(),
        Err(EncodeError::DuplicateNativeOffset {
            offset: 0x10,
            kind: StackMapKind::Default,
        })
    );

    let mut builder = CodeInfoBuilder::new();
    builder.add_stack_map(0x10, 5, StackMapKind::Catch);
    builder.add_stack_map(0x20, 5, StackMapKind::Catch);
    let err = builder.encode().expect_err("duplicate guest offset must fail");
    assert_eq!(
        err,
        EncodeError::DuplicateGuestOffset {
            offset: 5,
            kind: StackMapKind::Catch,
        }
    );
    assert_eq!(err.to_string(), "duplicate catch stack map for guest offset 0x5");

    // The same offsets in different kinds are fine.
    let mut builder = CodeInfoBuilder::new();
    builder.add_stack_map(0x10, 5, StackMapKind::Default);
    builder.add_stack_map(0x10, 5, StackMapKind::Catch);
    assert!(builder.encode().is_ok());
}

#[test]
fn parse_rejects_corrupt_blobs() {
    let bytes = encode(FrameInfo::new(32, 0, 0), &[(0x10, 1, StackMapKind::Default)]);

    let mut bad_magic = bytes.clone();
    bad_magic[0..4].copy_from_slice(b"NOPE");
    assert!(matches!(
        CodeInfo::parse(&bad_magic),
        Err(CodeInfoError::InvalidMagic(_))
    ));

    let mut bad_version = bytes.clone();
    bad_version[4..6].copy_from_slice(&9u16.to_le_bytes());
    assert_eq!(
        CodeInfo::parse(&bad_version).err(),
        Some(CodeInfoError::UnsupportedVersion(9))
    );

    let mut bad_flags = bytes.clone();
    bad_flags[6..8].copy_from_slice(&1u16.to_le_bytes());
    assert_eq!(
        CodeInfo::parse(&bad_flags).err(),
        Some(CodeInfoError::UnsupportedFlags(1))
    );

    let truncated = &bytes[..bytes.len() - 1];
    assert_eq!(
        CodeInfo::parse(truncated).err(),
        Some(CodeInfoError::UnexpectedEof)
    );

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(
        CodeInfo::parse(&trailing).err(),
        Some(CodeInfoError::TrailingBytes)
    );

    let mut bad_kind = bytes.clone();
    let last = bad_kind.len() - 1;
    bad_kind[last] = 7;
    assert_eq!(
        CodeInfo::parse(&bad_kind).err(),
        Some(CodeInfoError::InvalidKind { index: 0, kind: 7 })
    );

    let mut huge_count = bytes.clone();
    huge_count[20..24].copy_from_slice(&u32::MAX.to_le_bytes());
    assert_eq!(
        CodeInfo::parse(&huge_count).err(),
        Some(CodeInfoError::UnexpectedEof)
    );
}

#[test]
fn dump_lists_every_stack_map() {
    let bytes = encode(
        FrameInfo::new(48, 0b11, 0),
        &[
            (0x04, 0, StackMapKind::Default),
            (0x18, 6, StackMapKind::Catch),
        ],
    );
    let info = CodeInfo::parse(&bytes).expect("code info should parse");
    let dump = info.to_string();
    assert!(dump.starts_with("frame 48 bytes"), "{dump}");
    assert!(dump.contains("2 stack maps"));
    assert!(dump.contains("native 0x0004 -> guest 0x0000 (default)"));
    assert!(dump.contains("native 0x0018 -> guest 0x0006 (catch)"));
}
