/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Sinks that receive encoded epochs.
//!
//! # Overview
//!
//! The epoch pipeline talks to its output through [`StreamWriter`], which receives epochs as
//! a window layout followed by encoded compositions. [`PgsStreamWriter`] is the bundled
//! implementation: it serializes every composition as a PGS display set.
//!
//! A display set consists of five segment types, appearing in this order:
//!
//! 1. Presentation Composition Segment (PCS)
//! 2. Window Definition Segment (WDS)
//! 3. Palette Definition Segment (PDS)
//! 4. Object Definition Segment (ODS)
//! 5. End Segment (ES)
//!
//! The first display set of an epoch is flagged as an epoch start and is followed by normal
//! display sets; ending an epoch emits one final display set with no composition objects,
//! which clears the screen.

#[cfg(test)]
mod tests;

mod segmentwrite;

pub use segmentwrite::*;

use super::{
    epoch::EncodeResult,
    image::Rect,
    pool::{ObjectBuffer, PaletteBuffer},
};
use std::rc::Rc;

/// Largest number of windows one epoch may define.
pub const MAX_WINDOWS: usize = 2;

/// One on-screen composition region of an epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    pub id: u8,
    pub rect: Rect,
}

/// The bounded window layout shared by every composition of an epoch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WindowDescriptor {
    windows: Vec<Window>,
}

impl WindowDescriptor {

    /// Builds a layout from at most [`MAX_WINDOWS`] regions, assigning ids in order.
    pub fn new(regions: Vec<Rect>) -> Self {

        debug_assert!(!regions.is_empty() && regions.len() <= MAX_WINDOWS);

        Self {
            windows: regions.iter().enumerate().map(|(at, &rect)|
                Window {
                    id: at as u8,
                    rect,
                }
            ).collect::<Vec<Window>>(),
        }
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }
}

/// One encoded display set: a presentation interval plus references into the buffer pool.
#[derive(Clone, Debug)]
pub struct Composition {
    pub pts: u64,
    pub ets: u64,
    pub palette: Rc<PaletteBuffer>,
    /// One object per window the composition touches; never empty, never more than
    /// [`MAX_WINDOWS`].
    pub objects: Vec<CompositionObject>,
}

/// Places one pooled object inside a window.
#[derive(Clone, Debug)]
pub struct CompositionObject {
    pub window_id: u8,
    pub x: u32,
    pub y: u32,
    pub buffer: Rc<ObjectBuffer>,
}

/// Receives encoded epochs in presentation order.
pub trait StreamWriter {
    /// Opens a new epoch composing to the given windows.
    fn start_epoch(&mut self, windows: &WindowDescriptor) -> EncodeResult<()>;
    /// Writes one encoded composition of the current epoch.
    fn write_composition(&mut self, composition: &Composition) -> EncodeResult<()>;
    /// Records that the composition covering `[pts, ets)` was dropped and will never be
    /// written.
    fn ignore_composition(&mut self, pts: u64, ets: u64) -> EncodeResult<()>;
    /// Closes the current epoch.
    fn end_epoch(&mut self) -> EncodeResult<()>;
}
