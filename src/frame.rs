/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Decoded subtitle frames and the sources that produce them.


use super::{
    image::{Rect, Size},
    FrameRate,
};
use std::io::Result as IoResult;

/// Provides sequential access to decoded BGRA subtitle frames.
pub trait FrameSource {
    /// Returns the total number of frames the stream will produce.
    fn frame_count(&self) -> i64;
    /// Returns the pixel dimensions shared by every frame of the stream.
    fn frame_size(&self) -> Size;
    fn frame_rate(&self) -> FrameRate;
    /// Fills `target` with the next frame's BGRA pixels and returns the frame's stream index,
    /// or `None` once the stream is exhausted.
    fn read_next(&mut self, target: &mut [u8]) -> IoResult<Option<i64>>;
    /// Returns the index of the most recently read frame, or the frame count once the stream
    /// is exhausted.
    fn current_index(&self) -> i64;
}

/// An owned BGRA frame buffer.
///
/// The scanner keeps two of these and swaps their roles each iteration, so a single pair of
/// allocations serves the whole stream. A buffer that has not received a frame yet (or has
/// been [cleared](Self::clear)) carries index −1 and compares as blank.
pub struct Frame {
    index: i64,
    size: Size,
    data: Vec<u8>,
    visible: Option<Rect>,
}

impl Frame {

    pub fn new(size: Size) -> Self {
        Self {
            index: -1,
            size,
            data: vec![0u8; size.area() as usize * 4],
            visible: None,
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reads the next frame of `source` into this buffer.
    ///
    /// Returns `false` once the source is exhausted, in which case the buffer is cleared so
    /// that it compares as blank against whatever frame is still running.
    pub fn read_next_of<S: FrameSource>(&mut self, source: &mut S) -> IoResult<bool> {

        self.visible = None;

        match source.read_next(&mut self.data)? {
            Some(index) => {
                self.index = index;
                Ok(true)
            }
            None => {
                self.clear();
                Ok(false)
            }
        }
    }

    /// Resets the buffer to a fully transparent frame with no index.
    pub fn clear(&mut self) {
        self.index = -1;
        self.data.fill(0);
        self.visible = None;
    }

    /// Scans the alpha channel for any visible pixel.
    pub fn scan_blank(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }

    pub fn is_identical_to(&self, other: &Frame) -> bool {
        self.data == other.data
    }

    /// Clips the frame to its visible content.
    ///
    /// Fully transparent pixels are scrubbed to zero so that identical content always has
    /// identical bytes, and the bounding box of the remaining pixels is recorded as the
    /// frame's [visible bounds](Self::visible_bounds).
    pub fn normalize(&mut self) {

        let width = self.size.width;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for (at, px) in self.data.chunks_exact_mut(4).enumerate() {
            if px[3] == 0 {
                px.fill(0);
            } else {
                let x = at as u32 % width;
                let y = at as u32 / width;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        self.visible = if min_x == u32::MAX {
            None
        } else {
            Some(Rect {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            })
        };
    }

    /// Returns the bounding box of the frame's visible content, once computed by
    /// [`normalize`](Self::normalize).
    pub fn visible_bounds(&self) -> Option<Rect> {
        self.visible
    }
}
