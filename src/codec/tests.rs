/*
 * SPDX-FileCopyrightText: 2022 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use crate::image::Size;

#[test]
fn test_rle_single_zero() {
    assert_eq!(
        rle_compress(&[vec![0x00]]).unwrap(),
        vec![0x00, 0x01, 0x00, 0x00],
    );
}

#[test]
fn test_rle_single_color() {
    assert_eq!(
        rle_compress(&[vec![0x05]]).unwrap(),
        vec![0x05, 0x00, 0x00],
    );
}

#[test]
fn test_rle_double_color() {
    assert_eq!(
        rle_compress(&[vec![0x05, 0x05]]).unwrap(),
        vec![0x05, 0x05, 0x00, 0x00],
    );
}

#[test]
fn test_rle_short_color_run() {
    assert_eq!(
        rle_compress(&[vec![0x07; 10]]).unwrap(),
        vec![0x00, 0x8A, 0x07, 0x00, 0x00],
    );
}

#[test]
fn test_rle_long_color_run() {
    assert_eq!(
        rle_compress(&[vec![0x09; 100]]).unwrap(),
        vec![0x00, 0xC0, 0x64, 0x09, 0x00, 0x00],
    );
}

#[test]
fn test_rle_long_zero_run() {
    assert_eq!(
        rle_compress(&[vec![0x00; 100]]).unwrap(),
        vec![0x00, 0x40, 0x64, 0x00, 0x00],
    );
}

#[test]
fn test_rle_mixed_line() {
    assert_eq!(
        rle_compress(&[vec![0x00, 0x00, 0x01, 0x02, 0x02]]).unwrap(),
        vec![0x00, 0x02, 0x01, 0x02, 0x02, 0x00, 0x00],
    );
}

#[test]
fn test_rle_run_spanning_lines_restarts() {

    // Runs never continue across a line boundary.

    assert_eq!(
        rle_compress(&[vec![0x05], vec![0x05]]).unwrap(),
        vec![0x05, 0x00, 0x00, 0x05, 0x00, 0x00],
    );
}

#[test]
fn test_rle_overlong_line() {
    assert!(matches!(
        rle_compress(&[vec![0x00; 16_384]]),
        Err(ImageError::LineTooLong),
    ));
}

#[test]
fn test_quantize_solid_region() {

    let size = Size { width: 8, height: 8 };
    let mut canvas = ImageBuffer::new(size);
    let region = Rect { x: 2, y: 2, width: 4, height: 4 };

    canvas.restore(region, &solid_rows(region, [255, 255, 255, 255])).unwrap();

    let (entries, indexed) = quantize(&canvas, &[region]).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], PaletteEntry { id: 0, y: 16, cr: 128, cb: 128, alpha: 0 });
    assert_eq!(entries[1], PaletteEntry { id: 1, y: 235, cr: 128, cb: 128, alpha: 255 });

    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].len(), 4);
    assert!(indexed[0].iter().all(|line| line == &vec![1u8; 4]));
}

#[test]
fn test_quantize_shares_palette_across_regions() {

    let size = Size { width: 8, height: 8 };
    let mut canvas = ImageBuffer::new(size);
    let top = Rect { x: 0, y: 0, width: 4, height: 1 };
    let bottom = Rect { x: 0, y: 7, width: 4, height: 1 };

    canvas.restore(top, &solid_rows(top, [0, 0, 255, 255])).unwrap();
    canvas.restore(bottom, &solid_rows(bottom, [0, 0, 255, 255])).unwrap();

    let (entries, indexed) = quantize(&canvas, &[top, bottom]).unwrap();

    // Both regions map onto the same single color entry.

    assert_eq!(entries.len(), 2);
    assert_eq!(indexed[0], vec![vec![1u8; 4]]);
    assert_eq!(indexed[1], vec![vec![1u8; 4]]);
}

#[test]
fn test_quantize_transparent_pixels_reserve_index_zero() {

    let size = Size { width: 2, height: 1 };
    let mut canvas = ImageBuffer::new(size);
    let region = Rect { x: 0, y: 0, width: 2, height: 1 };

    canvas.restore(region, &[0, 0, 0, 0, 9, 9, 9, 255]).unwrap();

    let (entries, indexed) = quantize(&canvas, &[region]).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(indexed[0], vec![vec![0u8, 1u8]]);
}

#[test]
fn test_quantize_overflows_past_255_colors() {

    let size = Size { width: 16, height: 16 };
    let mut canvas = ImageBuffer::new(size);
    let region = Rect { x: 0, y: 0, width: 16, height: 16 };
    let mut rows = Vec::with_capacity(16 * 16 * 4);

    for value in 0u32..256 {
        rows.extend_from_slice(&[(value % 16) as u8 * 16, (value / 16) as u8 * 16, 0, 255]);
    }

    canvas.restore(region, &rows).unwrap();

    assert!(matches!(
        quantize(&canvas, &[region]),
        Err(ImageError::PaletteOverflow),
    ));
}

#[test]
fn test_ycbcr_reference_points() {
    assert_eq!(ycbcr_of(255, 255, 255), (235, 128, 128));
    assert_eq!(ycbcr_of(0, 0, 0), (16, 128, 128));
}

fn solid_rows(region: Rect, pixel: [u8; 4]) -> Vec<u8> {

    let mut rows = Vec::with_capacity(region.area() as usize * 4);

    for _ in 0..region.area() {
        rows.extend_from_slice(&pixel);
    }

    rows
}
