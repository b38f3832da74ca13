/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Turns staged BGRA regions into palette entries and run-length compressed lines.

#[cfg(test)]
mod tests;

use super::image::{ImageBuffer, ImageError, ImageResult, Rect};
use std::collections::HashMap;

/// Palette index reserved for fully transparent pixels.
///
/// Zero-byte runs have the shortest compressed forms, so the index that dominates subtitle
/// bitmaps gets the cheapest encoding.
const TRANSPARENT: u8 = 0x00;

/// The longest pixel run a single compressed sequence can express.
const MAX_RUN: usize = 16_383;

/// A single YCbCrA palette entry.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PaletteEntry {
    pub id: u8,
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    pub alpha: u8,
}

/// Quantizes canvas regions into one shared palette and per-region indexed lines.
///
/// All regions draw from a single palette so that a composition referencing two objects still
/// needs only one palette definition. Fully transparent pixels map to a reserved entry; every
/// other distinct BGRA value gets an entry of its own, which subtitle renderings comfortably
/// fit inside. More than 255 distinct colors is refused rather than approximated.
pub fn quantize(
    canvas: &ImageBuffer,
    regions: &[Rect],
) -> ImageResult<(Vec<PaletteEntry>, Vec<Vec<Vec<u8>>>)> {

    let mut table = HashMap::<[u8; 4], u8>::new();
    let mut entries = vec![
        PaletteEntry { id: TRANSPARENT, y: 16, cr: 128, cb: 128, alpha: 0 },
    ];
    let mut indexed = Vec::<Vec<Vec<u8>>>::with_capacity(regions.len());

    for region in regions {

        let mut lines = Vec::<Vec<u8>>::with_capacity(region.height as usize);

        for y in region.y..region.bottom() {

            let row = canvas.row(y, region.x, region.width)?;
            let mut line = Vec::<u8>::with_capacity(region.width as usize);

            for px in row.chunks_exact(4) {

                let index = if px[3] == 0 {
                    TRANSPARENT
                } else {
                    match table.get(&[px[0], px[1], px[2], px[3]]) {
                        Some(&index) => index,
                        None => {
                            if entries.len() > 255 {
                                return Err(ImageError::PaletteOverflow)
                            }
                            let index = entries.len() as u8;
                            let (y, cb, cr) = ycbcr_of(px[2], px[1], px[0]);
                            entries.push(PaletteEntry { id: index, y, cr, cb, alpha: px[3] });
                            table.insert([px[0], px[1], px[2], px[3]], index);
                            index
                        }
                    }
                };

                line.push(index);
            }

            lines.push(line);
        }

        indexed.push(lines);
    }

    Ok((entries, indexed))
}

/// Run-length compresses palette-indexed lines into object data.
pub fn rle_compress(lines: &[Vec<u8>]) -> ImageResult<Vec<u8>> {

    let mut output = Vec::<u8>::new();
    let mut byte = 0_u8;
    let mut count = 0_usize;

    for line in lines {

        for next_byte in line {
            if *next_byte == byte {
                count += 1;
            } else {
                if count > 0 {
                    rle_sequence(&mut output, byte, count)?;
                }
                byte = *next_byte;
                count = 1;
            }
        }

        rle_sequence(&mut output, byte, count)?;
        byte = 0;
        count = 0;

        output.push(0x00);
        output.push(0x00);
    }

    Ok(output)
}

fn rle_sequence(output: &mut Vec<u8>, byte: u8, count: usize) -> ImageResult<()> {

    if byte == 0x00 {
        match count {
            0 => {
            }
            1..=63 => {
                output.push(0x00);
                output.push(count as u8);
            }
            64..=MAX_RUN => {
                output.push(0x00);
                output.push(0x40 | (count >> 8) as u8);
                output.push((count & 0xFF) as u8);
            }
            _ => {
                return Err(ImageError::LineTooLong)
            }
        }
    } else {
        match count {
            0 => {
            }
            1 => {
                output.push(byte);
            }
            2 => {
                output.push(byte);
                output.push(byte);
            }
            3..=63 => {
                output.push(0x00);
                output.push(0x80 | count as u8);
                output.push(byte);
            }
            64..=MAX_RUN => {
                output.push(0x00);
                output.push(0xC0 | (count >> 8) as u8);
                output.push((count & 0xFF) as u8);
                output.push(byte);
            }
            _ => {
                return Err(ImageError::LineTooLong)
            }
        }
    }

    Ok(())
}

/// Converts a gamma-encoded BT.709 RGB pixel into a limited-range YCbCr triple.
pub fn ycbcr_of(red: u8, green: u8, blue: u8) -> (u8, u8, u8) {

    let r = bt1886_eotf(red as f64 / 255.0);
    let g = bt1886_eotf(green as f64 / 255.0);
    let b = bt1886_eotf(blue as f64 / 255.0);

    let y = ((compress(bt1886_oetf(
            0.2126 * r
            + 0.7152 * g
            + 0.0722 * b
        )) * 255.0) - 0.25).max(0.0).min(255.0).round() as u8;
        // The '- 0.25' keeps repeated RGB/YCbCr trips from drifting upwards.
    let cb = ((
            -0.09991 * r
            - 0.33609 * g
            + 0.436 * b
            + 1.0
        ) * 128.0).max(0.0).min(255.0).round() as u8;
    let cr = ((
            0.615 * r
            - 0.55861 * g
            - 0.05639 * b
            + 1.0
        ) * 128.0).max(0.0).min(255.0).round() as u8;

    (y, cb, cr)
}

fn bt1886_eotf(v: f64) -> f64 {
    v.powf(2.4).max(0.0).min(1.0)
}

fn bt1886_oetf(l: f64) -> f64 {
    l.powf(0.4166666666666667).max(0.0).min(1.0)
}

fn compress(value: f64) -> f64 {
    (value * 0.859375) + 0.06274509803
}
