/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Batches key frames into epochs and encodes them against the buffer pool.
//!
//! # Overview
//!
//! Every registered key frame becomes a [`DisplaySetThumb`] queued on the current epoch. When
//! a thumb cannot join the epoch (its presentation is discontinuous, or the epoch's planned
//! buffer demand or window coverage would grow too large), the pipeline first encodes and
//! writes out the whole epoch, then starts a fresh one with the new thumb.
//!
//! An epoch flush either runs to completion or leaves the queue empty: a composition whose
//! buffers cannot be allocated is skipped and reported to the sink as an ignored interval,
//! while any other failure discards the remaining thumbs before it propagates, so a later
//! flush is always a safe no-op.


use super::{
    codec,
    frame::Frame,
    image::{ImageBuffer, ImageError, Rect, Size},
    pool::{BufferPool, PoolError},
    stream::{Composition, CompositionObject, StreamWriter, WindowDescriptor, WriteError},
    ts_to_timestamp,
    FrameRate,
};
use log::{info, trace, warn};
use std::{
    collections::VecDeque,
    io::Error as IoError,
};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// The error type for the encoding pipeline.
///
/// [`Exhausted`](Self::Exhausted) is recoverable at composition granularity; every other
/// variant aborts the encode once the in-flight epoch's queue has been discarded.
#[derive(ThisError, Debug)]
pub enum EncodeError {
    /// The frame source failed to produce a frame.
    #[error("frame stream read failed")]
    SourceIo {
        #[from]
        source: IoError,
    },
    /// A staging cache backed by temporary storage failed.
    #[error("staging cache operation failed")]
    Staging {
        source: IoError,
    },
    /// An image operation was invalid.
    #[error("invalid image operation")]
    Image {
        #[from]
        source: ImageError,
    },
    /// An epoch was managed out of order.
    #[error("invalid epoch managing operation: {detail}")]
    Epoch {
        detail: &'static str,
    },
    /// The output sink failed.
    #[error("segment stream write failed")]
    Stream {
        #[from]
        source: WriteError,
    },
    /// The buffer pool could not satisfy an allocation.
    #[error("composition buffer allocation failed")]
    Exhausted {
        #[from]
        source: PoolError,
    },
    /// A failure that already carries its final user-facing message.
    #[error("{0}")]
    User(&'static str),
}

/// Tunables for the encoding pipeline.
#[derive(Clone, Copy, Debug)]
pub struct EncoderConfig {
    /// Upper bound assumed for one composition's compressed footprint when planning epoch
    /// boundaries against the pool capacity.
    pub max_object_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_object_size: 1 << 20,
        }
    }
}

/// One queued display set: a presentation interval, its crop, and the cropped pixel rows
/// captured from the staging canvas at registration time.
pub struct DisplaySetThumb {
    pts: u64,
    ets: u64,
    crop: Rect,
    size_budget: usize,
    cached: Vec<u8>,
}

impl DisplaySetThumb {

    pub fn pts(&self) -> u64 {
        self.pts
    }

    pub fn ets(&self) -> u64 {
        self.ets
    }

    pub fn crop(&self) -> Rect {
        self.crop
    }
}

/// The current epoch's queue and accumulated geometry.
struct Epoch {
    queue: VecDeque<DisplaySetThumb>,
    crops: Vec<Rect>,
    planned: usize,
    last_ets: u64,
}

impl Epoch {

    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            crops: Vec::new(),
            planned: 0,
            last_ets: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    /// Decides whether the thumb must open a new epoch instead of joining this one.
    fn starts_new_epoch(&self, thumb: &DisplaySetThumb, capacity: usize, screen: Size) -> bool {

        if self.queue.is_empty() {
            return false
        }

        // The screen went blank between the previous display set and this one.
        if thumb.pts != self.last_ets {
            return true
        }
        // Planned compressed data would outgrow the pool.
        if self.planned + thumb.size_budget > capacity {
            return true
        }

        // Merged windows may not take over the whole screen.

        let merged = self.crops.iter().fold(thumb.crop, |merged, &crop| merged.union(crop));

        merged.area() * 2 > screen.area()
    }

    fn enqueue(&mut self, thumb: DisplaySetThumb) {
        self.planned += thumb.size_budget;
        self.last_ets = thumb.ets;
        self.crops.push(thumb.crop);
        self.queue.push_back(thumb);
    }

    fn dequeue(&mut self) -> Option<DisplaySetThumb> {
        self.queue.pop_front()
    }

    /// Derives the epoch's window layout from its queued crops.
    ///
    /// Crops are merged into a single bounding window unless splitting them at the widest
    /// vertical gap yields two windows with less total area, which keeps a top and a bottom
    /// subtitle from dragging one window across the entire picture.
    fn window_layout(&self) -> WindowDescriptor {

        let mut sorted = self.crops.clone();

        sorted.sort_by_key(|crop| crop.y);

        let mut gap_at = None;
        let mut gap_size = 0;
        let mut bottom = sorted[0].bottom();

        for (at, crop) in sorted.iter().enumerate().skip(1) {
            if crop.y > bottom && crop.y - bottom > gap_size {
                gap_size = crop.y - bottom;
                gap_at = Some(at);
            }
            bottom = bottom.max(crop.bottom());
        }

        let merged = sorted[1..].iter().fold(sorted[0], |merged, &crop| merged.union(crop));

        if let Some(at) = gap_at {

            let upper = sorted[1..at].iter().fold(sorted[0], |m, &c| m.union(c));
            let lower = sorted[at + 1..].iter().fold(sorted[at], |m, &c| m.union(c));

            if upper.area() + lower.area() < merged.area() {
                return WindowDescriptor::new(vec![upper, lower])
            }
        }

        WindowDescriptor::new(vec![merged])
    }
}

/// Accumulates key frames into epochs and drives their encoding.
pub struct EpochPipeline<'a, W> {
    screen: Size,
    frame_rate: FrameRate,
    config: EncoderConfig,
    pool: &'a mut BufferPool,
    out: W,
    canvas: ImageBuffer,
    epoch: Epoch,
    epoch_count: u64,
}

impl<'a, W: StreamWriter> EpochPipeline<'a, W> {

    pub fn new(
        screen: Size,
        frame_rate: FrameRate,
        config: EncoderConfig,
        pool: &'a mut BufferPool,
        out: W,
    ) -> Self {

        info!("PGS encoding pipeline created for {}x{}", screen.width, screen.height);

        Self {
            screen,
            frame_rate,
            config,
            pool,
            out,
            canvas: ImageBuffer::new(screen),
            epoch: Epoch::new(),
            epoch_count: 0,
        }
    }

    /// Registers a key frame that stays on screen for `duration` frames.
    ///
    /// Blank frames are ignored. The frame must have been normalized so that its visible
    /// bounds are known.
    pub fn register_frame(&mut self, frame: &Frame, duration: i64) -> EncodeResult<()> {

        let crop = match frame.visible_bounds() {
            Some(crop) => crop,
            None => return Ok(()),
        };

        if duration <= 0 {
            return Err(EncodeError::Epoch { detail: "key frame duration must be positive" })
        }

        let pts = self.frame_rate.ticks_of_frame(frame.index());
        let ets = self.frame_rate.ticks_of_frame(frame.index() + duration);
        let size_budget = (crop.area() as usize + 2 * crop.height as usize)
            .min(self.config.max_object_size);
        let mut thumb = DisplaySetThumb {
            pts,
            ets,
            crop,
            size_budget,
            cached: Vec::new(),
        };

        if self.epoch.starts_new_epoch(&thumb, self.pool.capacity(), self.screen) {

            self.epoch_count += 1;

            info!(
                "epoch {} starts at frame {}; encoding the previous epoch, {} compositions \
                in total",
                self.epoch_count,
                frame.index(),
                self.epoch.len(),
            );

            self.flush_epoch()?;
        }

        self.canvas.copy_from(frame.data(), frame.size(), crop)?;
        thumb.cached = self.canvas.export(crop)?;
        self.epoch.enqueue(thumb);

        Ok(())
    }

    /// Encodes and writes out the current epoch.
    ///
    /// On a fatal failure the queue is discarded before the failure propagates, so calling
    /// this again afterwards is a no-op.
    pub fn flush_epoch(&mut self) -> EncodeResult<()> {

        if self.epoch.is_empty() {
            return Ok(())
        }

        match self.encode_epoch() {
            Ok(()) => Ok(()),
            Err(err) => {
                while self.epoch.dequeue().is_some() {
                }
                self.epoch.crops.clear();
                self.epoch.planned = 0;
                Err(err)
            }
        }
    }

    /// Flushes whatever epoch is still accumulating and returns the sink.
    pub fn finish(mut self) -> EncodeResult<W> {
        self.flush_epoch()?;
        Ok(self.out)
    }

    fn encode_epoch(&mut self) -> EncodeResult<()> {

        let layout = self.epoch.window_layout();

        self.out.start_epoch(&layout)?;

        loop {

            // The canvas is reused between compositions; whatever the previous iteration
            // staged inside the epoch's windows must not leak into this one.

            for window in layout.windows() {
                self.canvas.erase(window.rect);
            }

            let thumb = match self.epoch.dequeue() {
                Some(thumb) => thumb,
                None => break,
            };

            self.canvas.restore(thumb.crop, &thumb.cached)?;

            trace!("encoding composition at PTS={}", ts_to_timestamp(thumb.pts));

            match self.encode_composition(&thumb, &layout) {
                Ok(composition) => {
                    self.out.write_composition(&composition)?;
                }
                Err(EncodeError::Exhausted { source }) => {
                    warn!(
                        "ignored composition at PTS={} to ETS={}: {}",
                        ts_to_timestamp(thumb.pts),
                        ts_to_timestamp(thumb.ets),
                        source,
                    );
                    self.out.ignore_composition(thumb.pts, thumb.ets)?;
                }
                Err(err) => return Err(err),
            }
        }

        self.epoch.crops.clear();
        self.epoch.planned = 0;
        self.out.end_epoch()?;

        Ok(())
    }

    fn encode_composition(
        &mut self,
        thumb: &DisplaySetThumb,
        layout: &WindowDescriptor,
    ) -> EncodeResult<Composition> {

        let mut targets = Vec::<(u8, Rect)>::new();

        for window in layout.windows() {
            if let Some(region) = window.rect.intersection(thumb.crop) {
                targets.push((window.id, region));
            }
        }

        if targets.is_empty() {
            return Err(EncodeError::Epoch {
                detail: "display set lies outside the epoch window layout",
            })
        }

        let regions = targets.iter().map(|&(_, region)| region).collect::<Vec<Rect>>();
        let (entries, indexed) = codec::quantize(&self.canvas, &regions)?;
        let palette = self.pool.allocate_palette(entries)?;
        let mut objects = Vec::<CompositionObject>::with_capacity(targets.len());

        for (&(window_id, region), lines) in targets.iter().zip(indexed.iter()) {

            let data = codec::rle_compress(lines)?;
            let buffer = self.pool.allocate_object(region.width, region.height, data)?;

            objects.push(CompositionObject {
                window_id,
                x: region.x,
                y: region.y,
                buffer,
            });
        }

        Ok(Composition {
            pts: thumb.pts,
            ets: thumb.ets,
            palette,
            objects,
        })
    }
}
