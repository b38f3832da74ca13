/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Encodes a time-indexed sequence of rendered subtitle bitmaps into a Presentation Graphics
//! Stream (PGS).
//!
//! # Overview
//!
//! A PGS bitstream is organized into epochs. Each epoch defines the areas of the screen it
//! will compose to (its windows) and then presents a series of timed compositions, with each
//! composition referencing shared palettes and compressed objects.
//!
//! Encoding proceeds in three stages:
//!
//! 1. A [scanner](scan::FrameScanner) reduces a raw per-frame bitmap stream to the minimal
//!    sequence of key frames, each with the number of frames it stays on screen. A cue-timeline
//!    [advisor](advisor::CueAdvisor) can answer the scanner's blankness and identity queries
//!    from precomputed timing spans so that static runs are skipped without touching pixels.
//! 2. An [epoch pipeline](epoch::EpochPipeline) batches key frames into epochs, derives each
//!    epoch's window layout, and encodes every display set against a capacity-bounded
//!    [buffer pool](pool::BufferPool).
//! 3. A [stream writer](stream::StreamWriter) serializes the resulting compositions as PGS
//!    segments.

pub mod advisor;
pub mod codec;
pub mod epoch;
pub mod frame;
pub mod image;
pub mod pool;
pub mod scan;
pub mod stream;


/// Ticks of the 90 kHz PGS presentation clock.
pub type Ticks = u64;

/// Frequency of the PGS presentation clock in ticks per second.
pub const CLOCK_RATE: u64 = 90_000;

/// Represents a valid Blu-ray video frame rate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FrameRate {
    /// 23.976 frames per second (24,000/1,001).
    Ntsc24,
    /// 24 frames per second.
    Film24,
    /// 25 frames per second.
    Pal25,
    /// 29.97 frames per second (30,000/1,001).
    Ntsc30,
    /// 50 frames per second.
    Pal50,
    /// 59.94 frames per second (60,000/1,001).
    Ntsc60,
}

impl FrameRate {

    /// Returns the exact frame rate as a rational number of frames per second.
    pub fn ratio(self) -> (u64, u64) {
        match self {
            Self::Ntsc24 => (24_000, 1_001),
            Self::Film24 => (24, 1),
            Self::Pal25 => (25, 1),
            Self::Ntsc30 => (30_000, 1_001),
            Self::Pal50 => (50, 1),
            Self::Ntsc60 => (60_000, 1_001),
        }
    }

    /// Returns the value used by the `frame_rate` field of presentation composition segments.
    pub fn id(self) -> u8 {
        match self {
            Self::Ntsc24 => 0x10,
            Self::Film24 => 0x20,
            Self::Pal25 => 0x30,
            Self::Ntsc30 => 0x40,
            Self::Pal50 => 0x60,
            Self::Ntsc60 => 0x70,
        }
    }

    /// Returns the presentation time of the given frame on the 90 kHz clock.
    pub fn ticks_of_frame(self, index: i64) -> Ticks {

        let (num, den) = self.ratio();

        index.max(0) as u64 * CLOCK_RATE * den / num
    }

    /// Returns the first frame whose presentation time is at or after the given clock value.
    pub fn first_frame_at(self, ticks: Ticks) -> i64 {

        let (num, den) = self.ratio();
        let unit = CLOCK_RATE * den;

        ((ticks * num + unit - 1) / unit) as i64
    }
}

impl Default for FrameRate {
    fn default() -> Self { Self::Ntsc24 }
}

/// Renders a 90 kHz clock value as `HH:MM:SS.mmm`.
pub fn ts_to_timestamp(ts: Ticks) -> String {

    let ms = ts / (CLOCK_RATE / 1_000);

    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1_000 % 60,
        ms % 1_000,
    )
}

/// Receives best-effort progress notifications from long-running operations.
///
/// Reporters never influence what gets encoded; every call site behaves identically when no
/// reporter is attached. Cancellation is cooperative and polled between units of work.
pub trait ProgressReporter {
    /// Announces the total amount of work about to be performed.
    fn report_amount(&mut self, amount: u64);
    /// Announces the amount of work performed so far.
    fn report_progress(&mut self, progress: u64);
    /// Announces that no further progress will be reported.
    fn report_end(&mut self);
    /// Returns `true` once the host has requested that the operation stop.
    fn is_canceled(&self) -> bool;
}
