/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Reduces a per-frame bitmap stream to registered key frames.
//!
//! # Overview
//!
//! The scanner reads frames one at a time into a pair of owned buffers: the running frame
//! (the last distinct visual state) and the current frame (the newest read). A current frame
//! identical to the running one is simply discarded, which collapses every static run into a
//! single registration. When the picture changes, the running frame is registered with the
//! number of frames it stayed on screen and the buffers swap roles.
//!
//! Identity and blankness are decided by an attached [`FrameAdvisor`] when one is available,
//! and by direct pixel comparison otherwise.


use super::{
    advisor::{Blankness, FrameAdvisor},
    epoch::{EncodeError, EpochPipeline},
    frame::{Frame, FrameSource},
    stream::StreamWriter,
    ProgressReporter,
};
use log::{debug, info};
use std::mem;
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for scanning operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// The user-facing error type for encoding runs.
///
/// Every internal failure kind maps to exactly one of these, each carrying a fixed final
/// message; a failure that already carries its own message passes through as
/// [`User`](Self::User) without being rewrapped.
#[derive(ThisError, Debug)]
pub enum ScanError {
    #[error("Cache file creation failed.")]
    CacheFailure {
        source: EncodeError,
    },
    #[error("Invalid image operation.")]
    ImageOperation {
        source: EncodeError,
    },
    #[error("Invalid epoch managing operation.")]
    EpochOperation {
        source: EncodeError,
    },
    #[error("Stream I/O failed.")]
    StreamFailure {
        source: EncodeError,
    },
    #[error("Unrecognized internal failure. Encoding failed.")]
    Internal {
        source: EncodeError,
    },
    #[error("{0}")]
    User(&'static str),
}

impl From<EncodeError> for ScanError {

    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Staging { .. } => Self::CacheFailure { source: err },
            EncodeError::Image { .. } => Self::ImageOperation { source: err },
            EncodeError::Epoch { .. } => Self::EpochOperation { source: err },
            EncodeError::SourceIo { .. } => Self::StreamFailure { source: err },
            EncodeError::Stream { .. } => Self::StreamFailure { source: err },
            EncodeError::User(message) => Self::User(message),
            EncodeError::Exhausted { .. } => Self::Internal { source: err },
        }
    }
}

/// How a scan came to its end. Neither outcome is an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanOutcome {
    /// The frame source was read to exhaustion.
    Completed,
    /// The attached reporter requested cancellation; already-registered frames stay valid.
    Canceled,
}

/// Scans a frame stream for key frames and feeds them to an epoch pipeline.
pub struct FrameScanner<'a> {
    advisor: Option<&'a dyn FrameAdvisor>,
    reporter: Option<&'a mut dyn ProgressReporter>,
}

impl<'a> FrameScanner<'a> {

    pub fn new(
        advisor: Option<&'a dyn FrameAdvisor>,
        reporter: Option<&'a mut dyn ProgressReporter>,
    ) -> Self {
        Self { advisor, reporter }
    }

    /// Runs the scan loop until the source is exhausted or the reporter cancels.
    ///
    /// Cancellation is polled once per frame; once signaled, no further frames are
    /// registered. End-of-reporting is signaled exactly once on both termination paths.
    pub fn scan<S, W>(
        &mut self,
        source: &mut S,
        pipeline: &mut EpochPipeline<'_, W>,
    ) -> ScanResult<ScanOutcome>
    where
        S: FrameSource,
        W: StreamWriter,
    {

        let amount = source.frame_count();

        info!("encoding starting, {} frames in total", amount);

        let size = source.frame_size();
        let mut running = Frame::new(size);
        let mut current = Frame::new(size);
        let mut running_blank = true;
        let reporting = self.reporter.is_some() && amount > 0;
        let mut report_init = false;
        let mut frame_offset = 0_i64;
        let mut eos = false;

        while !eos && !self.canceled() {

            let read = current.read_next_of(source).map_err(EncodeError::from)?;

            if !read {
                eos = true;
            } else if reporting {

                let index = current.index();

                if !report_init {
                    frame_offset = index;
                    report_init = true;
                    if let Some(r) = self.reporter.as_deref_mut() {
                        r.report_amount((amount - frame_offset).max(0) as u64);
                    }
                }
                if let Some(r) = self.reporter.as_deref_mut() {
                    r.report_progress((index - frame_offset).max(0) as u64);
                }
            }

            if self.identical(&current, &running, running_blank) {
                continue
            }

            if !running_blank {
                debug!("encountered a key frame at index {}", running.index());
                pipeline.register_frame(&running, source.current_index() - running.index())?;
            }

            mem::swap(&mut running, &mut current);
            running_blank = self.blank(&running);

            if !running_blank {
                running.normalize();
            }
        }

        if let Some(r) = self.reporter.as_deref_mut() {
            r.report_end();
        }

        if eos {
            info!("encoding successfully completed");
            Ok(ScanOutcome::Completed)
        } else {
            info!("encoding canceled by user");
            Ok(ScanOutcome::Canceled)
        }
    }

    fn canceled(&self) -> bool {
        self.reporter.as_deref().map_or(false, |r| r.is_canceled())
    }

    fn identical(&self, current: &Frame, running: &Frame, running_blank: bool) -> bool {

        if let Some(advisor) = self.advisor {
            return advisor.is_identical(current.index(), running.index())
        }
        if running_blank {
            return current.scan_blank()
        }

        current.is_identical_to(running)
    }

    fn blank(&self, frame: &Frame) -> bool {
        match self.advisor {
            Some(advisor) => advisor.is_blank(frame.index()) == Blankness::Blank,
            None => frame.scan_blank(),
        }
    }
}

/// Runs a complete encode: scans `source` into `pipeline`, then finishes the pipeline so the
/// trailing epoch is not lost, and returns the outcome together with the sink.
pub fn encode<'a, S, W>(
    source: &mut S,
    mut pipeline: EpochPipeline<'_, W>,
    advisor: Option<&'a dyn FrameAdvisor>,
    reporter: Option<&'a mut dyn ProgressReporter>,
) -> ScanResult<(ScanOutcome, W)>
where
    S: FrameSource,
    W: StreamWriter,
{

    let mut scanner = FrameScanner::new(advisor, reporter);
    let outcome = scanner.scan(source, &mut pipeline)?;
    let sink = pipeline.finish()?;

    Ok((outcome, sink))
}
