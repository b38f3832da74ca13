/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Answers frame blankness and identity queries from precomputed cue timing.
//!
//! # Overview
//!
//! Rendering a subtitle frame only to discover it equals the previous one is by far the most
//! expensive part of an encode. A [`CueAdvisor`] walks the subtitle timeline once up front,
//! converts every cue into a half-open [`Span`] of frame indices tagged static or animated,
//! and afterwards answers "is this frame blank" and "are these two frames identical" in
//! `O(log n)` from the span table alone, without touching pixels.
//!
//! Cues too short to be worth rendering are conservatively treated as animated, as is any
//! cue the provider reports as animated across its duration.


use super::{
    image::{ImageBuffer, ImageError, Size},
    FrameRate,
    ProgressReporter,
    Ticks,
};
use log::debug;
use thiserror::Error as ThisError;

/// Cues at or below this many frames are marked animated without being rendered.
const MIN_PARSE_FRAMES: i64 = 3;

/// A specialized [`Result`](std::result::Result) type for timeline parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// The error type for [`CueAdvisor::parse`].
#[derive(ThisError, Debug)]
pub enum ParseError {
    /// The attached reporter requested cancellation mid-parse.
    #[error("timeline parsing canceled")]
    Canceled,
    /// The provider failed to render a representative frame.
    #[error("cue rendering failed")]
    Render {
        #[from]
        source: ImageError,
    },
}

/// Definite blankness classification of a single frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Blankness {
    Blank,
    NotBlank,
}

/// A half-open run of frame indices covered by one subtitle cue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Span {
    /// First frame of the run.
    pub begin: i64,
    /// First frame past the run.
    pub end: i64,
    /// Whether the cue's content changes over the run.
    pub animated: bool,
}

/// Enumerates the cues of a subtitle timeline.
///
/// Cues are visited in presentation order through an opaque cursor. Start and stop times are
/// expressed on the 90 kHz clock.
pub trait CueSource {
    type Cue: Copy;

    /// Creates a cursor at the first cue active at or after the given time.
    fn first_cue_at(&mut self, time: Ticks) -> Option<Self::Cue>;
    fn start(&self, cue: Self::Cue) -> Ticks;
    fn stop(&self, cue: Self::Cue) -> Ticks;
    fn next(&mut self, cue: Self::Cue) -> Option<Self::Cue>;
    /// Reports whether the cue's content changes over its duration. Only meaningful after the
    /// cue has been rendered.
    fn is_animated(&mut self, cue: Self::Cue) -> bool;
    /// Renders the frame at the given time into `canvas`.
    fn render(&mut self, time: Ticks, canvas: &mut ImageBuffer) -> Result<(), ImageError>;
}

/// Answers the scanner's frame queries without pixel comparison.
pub trait FrameAdvisor {
    /// Classifies a frame as blank or not. Indices outside the advised range are blank.
    fn is_blank(&self, index: i64) -> Blankness;
    /// Reports whether two frames are visually identical.
    fn is_identical(&self, first: i64, second: i64) -> bool;
}

/// A [`FrameAdvisor`] backed by cue timing spans.
pub struct CueAdvisor {
    spans: Vec<Span>,
    from: i64,
    to: i64,
    offset: i64,
}

impl CueAdvisor {

    /// Parses a subtitle timeline into timing spans.
    ///
    /// The advised range is `[from, to)` in frame indices, with `None` meaning "as far as the
    /// timeline reaches"; either bound is clamped against actual cue coverage. Queries are
    /// adjusted by `offset` before classification.
    ///
    /// The timeline is walked twice: once to find its coverage and size the progress report,
    /// and once to render and classify each cue. Both passes poll the reporter for
    /// cancellation.
    pub fn parse<C: CueSource>(
        cues: &mut C,
        frame_rate: FrameRate,
        frame_size: Size,
        from: Option<i64>,
        to: Option<i64>,
        offset: i64,
        mut reporter: Option<&mut dyn ProgressReporter>,
    ) -> ParseResult<Self> {

        let mut from = from.unwrap_or(-1);
        let mut to = to.unwrap_or(-1);
        let mut spans = Vec::<Span>::new();
        let lead;

        //
        // FIRST PASS
        //

        if let Some(r) = reporter.as_deref_mut() {
            r.report_progress(0);
        }

        let mut cur = from.max(0);
        let mut cursor = cues.first_cue_at(frame_rate.ticks_of_frame(cur));

        while let Some(cue) = cursor {

            if to >= 0 && cur >= to {
                break
            }
            if reporter.as_deref().map_or(false, |r| r.is_canceled()) {
                return Err(ParseError::Canceled)
            }

            let begin = frame_rate.first_frame_at(cues.start(cue));
            let end = frame_rate.first_frame_at(cues.stop(cue));

            cur = end;
            spans.push(Span { begin, end, animated: true });
            cursor = cues.next(cue);
        }

        if spans.is_empty() {

            // Nothing on the timeline: every frame is blank.

            if let Some(r) = reporter.as_deref_mut() {
                r.report_amount(1);
                r.report_progress(1);
                r.report_end();
            }

            return Ok(Self { spans, from: 0, to: 0, offset })
        }

        let coverage_from = spans.first().unwrap().begin;
        let coverage_to = spans.last().unwrap().end;

        from = if from < 0 { coverage_from } else { from.max(coverage_from) };
        to = if to < 0 { coverage_to } else { to.min(coverage_to) };

        // The lead-in lets the reporter show early movement before the heavier second pass.

        let len = (to - from).max(0);

        lead = len >> 3;

        if let Some(r) = reporter.as_deref_mut() {
            r.report_amount((len + lead) as u64);
            r.report_progress(lead as u64);
        }

        spans.clear();

        //
        // SECOND PASS
        //

        let mut canvas = ImageBuffer::new(frame_size);
        let min_parse_ticks = frame_rate.ticks_of_frame(MIN_PARSE_FRAMES) + 1;

        cur = from.max(0);
        cursor = cues.first_cue_at(frame_rate.ticks_of_frame(cur));

        while let Some(cue) = cursor {

            if cur >= to {
                break
            }
            if reporter.as_deref().map_or(false, |r| r.is_canceled()) {
                return Err(ParseError::Canceled)
            }
            if let Some(r) = reporter.as_deref_mut() {
                r.report_progress((cur - from + lead).max(0) as u64);
            }

            let start = cues.start(cue);
            let stop = cues.stop(cue);
            let short = stop.saturating_sub(start) <= min_parse_ticks;

            if !short {
                cues.render(start, &mut canvas)?;
            }

            let animated = short || cues.is_animated(cue);
            let begin = frame_rate.first_frame_at(start);
            let end = frame_rate.first_frame_at(stop);

            cur = end;
            spans.push(Span { begin, end, animated });
            cursor = cues.next(cue);
        }

        if let Some(r) = reporter.as_deref_mut() {
            r.report_progress((to - from + lead).max(0) as u64);
            r.report_end();
        }

        debug!("parsed {} timeline spans covering frames {}..{}", spans.len(), from, to);

        Ok(Self { spans, from, to, offset })
    }

    /// Returns the parsed spans, ordered by their first frame.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Finds the span containing the (already offset-adjusted) index.
    ///
    /// Spans are non-overlapping, so ordering by `begin` and by `end` coincide and a single
    /// binary search on `end` suffices.
    fn span_index(&self, index: i64) -> Option<usize> {

        let at = self.spans.partition_point(|span| span.end <= index);

        match self.spans.get(at) {
            Some(span) if span.begin <= index => Some(at),
            _ => None,
        }
    }
}

impl FrameAdvisor for CueAdvisor {

    fn is_blank(&self, index: i64) -> Blankness {

        let index = index - self.offset;

        if index < self.from || index >= self.to {
            return Blankness::Blank
        }

        // An index inside a span is never classified as definitely blank, even when the span
        // is static: a static cue may still render as a fully transparent overlay. Kept for
        // compatibility with existing streams.

        match self.span_index(index) {
            Some(_) => Blankness::NotBlank,
            None => Blankness::Blank,
        }
    }

    fn is_identical(&self, first: i64, second: i64) -> bool {

        if first == second {
            return true
        }

        let a = first - self.offset;
        let b = second - self.offset;

        if a < self.from || a >= self.to {
            return self.is_blank(second) == Blankness::Blank
        }
        if b < self.from || b >= self.to {
            return self.is_blank(first) == Blankness::Blank
        }

        match (self.span_index(a), self.span_index(b)) {
            // Both indices fall in gaps between spans, so both frames are blank.
            (None, None) => true,
            // Only the same static span guarantees identical content.
            (Some(sa), Some(sb)) => sa == sb && !self.spans[sa].animated,
            _ => false,
        }
    }
}
