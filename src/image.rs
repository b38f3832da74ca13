/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Pixel geometry and the shared staging canvas.

#[cfg(test)]
mod tests;

use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// The error type for invalid image operations.
#[derive(ThisError, Debug)]
pub enum ImageError {
    /// The requested region does not lie within the canvas.
    #[error("image region is out of canvas bounds")]
    RegionOutOfBounds,
    /// The pixel data does not match the dimensions it was declared with.
    #[error("pixel data does not match its declared dimensions")]
    SizeMismatch,
    /// The region holds more distinct colors than one palette can address.
    #[error("region uses more colors than one palette can hold")]
    PaletteOverflow,
    /// A line exceeds the longest run length the compressor can express.
    #[error("object line is too long to compress")]
    LineTooLong,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A rectangular region of the screen.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {

    pub fn right(self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(self) -> u32 {
        self.y + self.height
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns the smallest rectangle covering both `self` and `other`.
    pub fn union(self, other: Rect) -> Rect {

        let x = self.x.min(other.x);
        let y = self.y.min(other.y);

        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Returns the overlap between `self` and `other`, if any.
    pub fn intersection(self, other: Rect) -> Option<Rect> {

        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect { x, y, width: right - x, height: bottom - y })
        } else {
            None
        }
    }
}

/// A reusable BGRA canvas the size of the video frame.
///
/// The epoch pipeline stages each key frame's cropped pixels here and erases the epoch's
/// window regions between compositions so that no stale pixels leak from one composition into
/// the next.
pub struct ImageBuffer {
    size: Size,
    data: Vec<u8>,
}

impl ImageBuffer {

    /// Creates a fully transparent canvas of the given size.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            data: vec![0u8; size.area() as usize * 4],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Copies the `crop` region of a raw BGRA frame onto the same position of the canvas.
    pub fn copy_from(&mut self, pixels: &[u8], frame_size: Size, crop: Rect) -> ImageResult<()> {

        if pixels.len() != frame_size.area() as usize * 4 {
            return Err(ImageError::SizeMismatch)
        }
        if crop.right() > frame_size.width || crop.bottom() > frame_size.height {
            return Err(ImageError::RegionOutOfBounds)
        }
        self.check(crop)?;

        for y in crop.y..crop.bottom() {
            let src = (y * frame_size.width + crop.x) as usize * 4;
            let dst = (y * self.size.width + crop.x) as usize * 4;
            let len = crop.width as usize * 4;
            self.data[dst..dst + len].copy_from_slice(&pixels[src..src + len]);
        }

        Ok(())
    }

    /// Copies the `region` of the canvas out into a contiguous row-major buffer.
    pub fn export(&self, region: Rect) -> ImageResult<Vec<u8>> {

        self.check(region)?;

        let mut out = Vec::with_capacity(region.area() as usize * 4);

        for y in region.y..region.bottom() {
            let src = (y * self.size.width + region.x) as usize * 4;
            let len = region.width as usize * 4;
            out.extend_from_slice(&self.data[src..src + len]);
        }

        Ok(out)
    }

    /// Copies rows previously taken with [`export`](Self::export) back onto the canvas.
    pub fn restore(&mut self, region: Rect, rows: &[u8]) -> ImageResult<()> {

        self.check(region)?;

        if rows.len() != region.area() as usize * 4 {
            return Err(ImageError::SizeMismatch)
        }

        for (row, y) in rows.chunks_exact(region.width as usize * 4).zip(region.y..) {
            let dst = (y * self.size.width + region.x) as usize * 4;
            self.data[dst..dst + row.len()].copy_from_slice(row);
        }

        Ok(())
    }

    /// Clears the given region to fully transparent, clipped to the canvas bounds.
    pub fn erase(&mut self, region: Rect) {

        let right = region.right().min(self.size.width);
        let bottom = region.bottom().min(self.size.height);

        if region.x >= right || region.y >= bottom {
            return
        }

        for y in region.y..bottom {
            let start = (y * self.size.width + region.x) as usize * 4;
            let end = start + (right - region.x) as usize * 4;
            self.data[start..end].fill(0);
        }
    }

    /// Borrows one row of the given region as raw BGRA bytes.
    pub fn row(&self, y: u32, x: u32, width: u32) -> ImageResult<&[u8]> {

        if x + width > self.size.width || y >= self.size.height {
            return Err(ImageError::RegionOutOfBounds)
        }

        let start = (y * self.size.width + x) as usize * 4;

        Ok(&self.data[start..start + width as usize * 4])
    }

    fn check(&self, region: Rect) -> ImageResult<()> {
        if region.right() > self.size.width || region.bottom() > self.size.height {
            Err(ImageError::RegionOutOfBounds)
        } else {
            Ok(())
        }
    }
}
