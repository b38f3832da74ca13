/*
 * SPDX-FileCopyrightText: 2022 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use crate::{
    codec::PaletteEntry,
    epoch::EncodeError,
    image::{Rect, Size},
    pool::BufferPool,
    FrameRate,
};
use std::io::Cursor;
use byteorder::{BigEndian, ReadBytesExt};

const SCREEN: Size = Size { width: 1920, height: 1080 };

#[test]
fn test_display_set_segment_walk() {

    let mut pool = BufferPool::new(1_000);
    let mut writer = PgsStreamWriter::new(Vec::<u8>::new(), SCREEN, FrameRate::Ntsc24);
    let window = Rect { x: 100, y: 900, width: 32, height: 16 };
    let composition = composition(&mut pool, window, 90_000, 135_000);

    writer.start_epoch(&WindowDescriptor::new(vec![window])).unwrap();
    writer.write_composition(&composition).unwrap();
    writer.end_epoch().unwrap();

    let segments = walk(writer.into_inner());

    let kinds = segments.iter().map(|segment| segment.kind).collect::<Vec<u8>>();

    assert_eq!(kinds, vec![0x16, 0x17, 0x14, 0x15, 0x80, 0x16, 0x80]);

    // Everything up to the end segment carries the composition's PTS; the closing display
    // set lands at its ETS.

    for segment in &segments[..5] {
        assert_eq!(segment.pts, 90_000);
        assert_eq!(segment.dts, 0);
    }
    for segment in &segments[5..] {
        assert_eq!(segment.pts, 135_000);
    }

    //
    // PCS
    //

    let pcs = &segments[0].payload;

    assert_eq!(&pcs[0..2], &1920u16.to_be_bytes());
    assert_eq!(&pcs[2..4], &1080u16.to_be_bytes());
    assert_eq!(pcs[4], 0x10);
    assert_eq!(&pcs[5..7], &0u16.to_be_bytes());
    assert_eq!(pcs[7], 0x80);
    assert_eq!(pcs[8], 0x00);
    assert_eq!(pcs[10], 1);

    //
    // WDS
    //

    let wds = &segments[1].payload;

    assert_eq!(wds[0], 1);
    assert_eq!(wds[1], 0);
    assert_eq!(&wds[2..4], &100u16.to_be_bytes());
    assert_eq!(&wds[4..6], &900u16.to_be_bytes());
    assert_eq!(&wds[6..8], &32u16.to_be_bytes());
    assert_eq!(&wds[8..10], &16u16.to_be_bytes());

    //
    // PDS holds two entries of five bytes after its id and version.
    //

    assert_eq!(segments[2].payload.len(), 2 + 2 * 5);

    //
    // ODS
    //

    let ods = &segments[3].payload;
    let data_len = ods.len() - 11;

    assert_eq!(ods[3], 0xC0);
    assert_eq!(
        u32::from_be_bytes([0, ods[4], ods[5], ods[6]]) as usize,
        data_len + 4,
    );
    assert_eq!(&ods[7..9], &32u16.to_be_bytes());
    assert_eq!(&ods[9..11], &16u16.to_be_bytes());

    //
    // The closing display set has a normal-case PCS with no composition objects.
    //

    let closing = &segments[5].payload;

    assert_eq!(&closing[5..7], &1u16.to_be_bytes());
    assert_eq!(closing[7], 0x00);
    assert_eq!(closing[10], 0);
    assert_eq!(segments[6].payload.len(), 0);
}

#[test]
fn test_second_composition_is_normal_case() {

    let mut pool = BufferPool::new(1_000);
    let mut writer = PgsStreamWriter::new(Vec::<u8>::new(), SCREEN, FrameRate::Ntsc24);
    let window = Rect { x: 100, y: 900, width: 32, height: 16 };

    writer.start_epoch(&WindowDescriptor::new(vec![window])).unwrap();
    writer.write_composition(&composition(&mut pool, window, 90_000, 135_000)).unwrap();
    writer.write_composition(&composition(&mut pool, window, 135_000, 180_000)).unwrap();
    writer.end_epoch().unwrap();

    let segments = walk(writer.into_inner());
    let states = segments.iter().filter(|segment| segment.kind == 0x16).map(|segment|
        (u16::from_be_bytes([segment.payload[5], segment.payload[6]]), segment.payload[7])
    ).collect::<Vec<(u16, u8)>>();

    // Composition numbers advance while only the first display set opens the epoch.

    assert_eq!(states, vec![(0, 0x80), (1, 0x00), (2, 0x00)]);
}

#[test]
fn test_ignored_interval_is_recorded_and_closes_the_epoch() {

    let mut writer = PgsStreamWriter::new(Vec::<u8>::new(), SCREEN, FrameRate::Ntsc24);
    let window = Rect { x: 0, y: 0, width: 16, height: 16 };

    writer.start_epoch(&WindowDescriptor::new(vec![window])).unwrap();
    writer.ignore_composition(90_000, 180_000).unwrap();

    assert_eq!(writer.skipped(), &[(90_000, 180_000)]);

    writer.end_epoch().unwrap();

    let segments = walk(writer.into_inner());

    assert_eq!(segments[0].kind, 0x16);
    assert_eq!(segments[0].pts, 180_000);
}

#[test]
fn test_composition_without_epoch_is_refused() {

    let mut pool = BufferPool::new(1_000);
    let mut writer = PgsStreamWriter::new(Vec::<u8>::new(), SCREEN, FrameRate::Ntsc24);
    let window = Rect { x: 0, y: 0, width: 16, height: 16 };
    let composition = composition(&mut pool, window, 0, 45_000);

    assert!(matches!(
        writer.write_composition(&composition),
        Err(EncodeError::Stream { source: WriteError::EpochNotStarted }),
    ));
}

#[test]
fn test_large_objects_split_across_segments() {

    let mut pool = BufferPool::new(1_000_000);
    let mut writer = PgsStreamWriter::new(Vec::<u8>::new(), SCREEN, FrameRate::Ntsc24);
    let window = Rect { x: 0, y: 0, width: 1000, height: 150 };
    let palette = pool.allocate_palette(vec![PaletteEntry::default()]).unwrap();
    let buffer = pool.allocate_object(1000, 150, vec![0x42; 150_000]).unwrap();
    let composition = Composition {
        pts: 90_000,
        ets: 180_000,
        palette,
        objects: vec![CompositionObject { window_id: 0, x: 0, y: 0, buffer }],
    };

    writer.start_epoch(&WindowDescriptor::new(vec![window])).unwrap();
    writer.write_composition(&composition).unwrap();
    writer.end_epoch().unwrap();

    let segments = walk(writer.into_inner());
    let sequences = segments.iter().filter(|segment| segment.kind == 0x15).map(|segment|
        segment.payload[3]
    ).collect::<Vec<u8>>();

    assert_eq!(sequences, vec![0x80, 0x00, 0x40]);

    // Only the first chunk declares the object's dimensions and total length.

    let chunks = segments.iter().filter(|segment| segment.kind == 0x15)
        .collect::<Vec<&RawSegment>>();

    assert_eq!(chunks[0].payload.len() - 11, 65_508);
    assert_eq!(chunks[1].payload.len() - 4, 65_515);
    assert_eq!(chunks[2].payload.len() - 4, 150_000 - 65_508 - 65_515);
    assert_eq!(
        u32::from_be_bytes([
            0, chunks[0].payload[4], chunks[0].payload[5], chunks[0].payload[6],
        ]) as usize,
        150_000 + 4,
    );
}

fn composition(pool: &mut BufferPool, region: Rect, pts: u64, ets: u64) -> Composition {

    let palette = pool.allocate_palette(vec![
        PaletteEntry { id: 0, y: 16, cr: 128, cb: 128, alpha: 0 },
        PaletteEntry { id: 1, y: 235, cr: 128, cb: 128, alpha: 255 },
    ]).unwrap();
    let lines = vec![vec![1u8; region.width as usize]; region.height as usize];
    let data = crate::codec::rle_compress(&lines).unwrap();
    let buffer = pool.allocate_object(region.width, region.height, data).unwrap();

    Composition {
        pts,
        ets,
        palette,
        objects: vec![
            CompositionObject {
                window_id: 0,
                x: region.x,
                y: region.y,
                buffer,
            },
        ],
    }
}

struct RawSegment {
    pts: u32,
    dts: u32,
    kind: u8,
    payload: Vec<u8>,
}

fn walk(bytes: Vec<u8>) -> Vec<RawSegment> {

    let total = bytes.len() as u64;
    let mut cursor = Cursor::new(bytes);
    let mut segments = Vec::new();

    while cursor.position() < total {

        assert_eq!(cursor.read_u16::<BigEndian>().unwrap(), 0x5047);

        let pts = cursor.read_u32::<BigEndian>().unwrap();
        let dts = cursor.read_u32::<BigEndian>().unwrap();
        let kind = cursor.read_u8().unwrap();
        let size = cursor.read_u16::<BigEndian>().unwrap() as usize;
        let mut payload = vec![0u8; size];

        std::io::Read::read_exact(&mut cursor, &mut payload).unwrap();
        segments.push(RawSegment { pts, dts, kind, payload });
    }

    segments
}
