/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{
    super::{
        epoch::EncodeResult,
        image::Size,
        pool::ObjectBuffer,
        ts_to_timestamp,
        FrameRate,
    },
    Composition,
    StreamWriter,
    WindowDescriptor,
};
use log::{trace, warn};
use std::io::{
    Error as IoError,
    Write,
};
use byteorder::{BigEndian, WriteBytesExt};
use thiserror::Error as ThisError;

/// Largest chunk of object data carried by the first segment of a split object.
const FIRST_CHUNK_SIZE: usize = 65_508;

/// Largest chunk of object data carried by each following segment of a split object.
const NEXT_CHUNK_SIZE: usize = 65_515;

/// Largest total compressed size one object may have.
const MAX_OBJECT_DATA_SIZE: usize = 16_777_211;

/// A specialized [`Result`](std::result::Result) type for segment-writing operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// The error type for [`PgsStreamWriter`].
///
/// Errors are caused by either invalid state or by an underlying I/O error.
#[derive(ThisError, Debug)]
pub enum WriteError {
    /// The segment could not be written because of an underlying I/O error.
    #[error("segment IO error")]
    IoError {
        /// The underlying I/O error.
        #[from]
        source: IoError,
    },
    /// A composition was written before any epoch was started.
    #[error("no epoch has been started")]
    EpochNotStarted,
    /// The composition being written references more windows than the epoch defines.
    #[error("too many composition objects in presentation composition segment")]
    TooManyCompositionObjects,
    /// The object being written has too much compressed data for one object definition.
    #[error("object data is too large")]
    ObjectDataTooLarge,
}

/// Serializes epochs as PGS display sets into any [`Write`] destination.
pub struct PgsStreamWriter<W> {
    sink: W,
    screen: Size,
    frame_rate: FrameRate,
    windows: Option<WindowDescriptor>,
    composition_number: u16,
    epoch_open: bool,
    last_ets: Option<u64>,
    skipped: Vec<(u64, u64)>,
}

impl<W: Write> PgsStreamWriter<W> {

    pub fn new(sink: W, screen: Size, frame_rate: FrameRate) -> Self {
        Self {
            sink,
            screen,
            frame_rate,
            windows: None,
            composition_number: 0,
            epoch_open: false,
            last_ets: None,
            skipped: Vec::new(),
        }
    }

    /// Returns every `[pts, ets)` interval that was dropped via
    /// [`ignore_composition`](StreamWriter::ignore_composition).
    pub fn skipped(&self) -> &[(u64, u64)] {
        &self.skipped
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn put_composition(&mut self, composition: &Composition) -> WriteResult<()> {

        let windows = match self.windows.clone() {
            Some(windows) => windows,
            None => return Err(WriteError::EpochNotStarted),
        };

        if composition.objects.len() > windows.windows().len() {
            return Err(WriteError::TooManyCompositionObjects)
        }

        let pts = composition.pts;
        let state = if self.epoch_open { 0x80 } else { 0x00 };

        self.put_pcs(pts, state, composition)?;
        self.put_wds(pts, &windows)?;
        self.put_pds(pts, composition)?;

        for object in composition.objects.iter() {
            self.put_ods(pts, &object.buffer)?;
        }

        self.put_end(pts)?;

        self.epoch_open = false;
        self.composition_number = self.composition_number.wrapping_add(1);
        self.last_ets = Some(composition.ets);

        Ok(())
    }

    fn put_clearing_composition(&mut self, pts: u64) -> WriteResult<()> {

        let mut payload = vec![];

        self.put_pcs_header(&mut payload, 0x00)?;
        payload.write_u8(0)?;

        self.put_segment(pts, 0x16, &payload)?;
        self.put_end(pts)?;

        self.composition_number = self.composition_number.wrapping_add(1);

        Ok(())
    }

    fn put_pcs(&mut self, pts: u64, state: u8, composition: &Composition) -> WriteResult<()> {

        let mut payload = vec![];

        self.put_pcs_header(&mut payload, state)?;
        payload.write_u8(composition.objects.len() as u8)?;

        for object in composition.objects.iter() {
            payload.write_u16::<BigEndian>(object.buffer.id())?;
            payload.write_u8(object.window_id)?;
            payload.write_u8(0x00)?;
            payload.write_u16::<BigEndian>(object.x as u16)?;
            payload.write_u16::<BigEndian>(object.y as u16)?;
        }

        self.put_segment(pts, 0x16, &payload)
    }

    fn put_pcs_header(&mut self, payload: &mut Vec<u8>, state: u8) -> WriteResult<()> {

        payload.write_u16::<BigEndian>(self.screen.width as u16)?;
        payload.write_u16::<BigEndian>(self.screen.height as u16)?;
        payload.write_u8(self.frame_rate.id())?;
        payload.write_u16::<BigEndian>(self.composition_number)?;
        payload.write_u8(state)?;
        payload.write_u8(0x00)?;
        payload.write_u8(0)?;

        Ok(())
    }

    fn put_wds(&mut self, pts: u64, windows: &WindowDescriptor) -> WriteResult<()> {

        let mut payload = vec![];

        payload.write_u8(windows.windows().len() as u8)?;

        for window in windows.windows().iter() {
            payload.write_u8(window.id)?;
            payload.write_u16::<BigEndian>(window.rect.x as u16)?;
            payload.write_u16::<BigEndian>(window.rect.y as u16)?;
            payload.write_u16::<BigEndian>(window.rect.width as u16)?;
            payload.write_u16::<BigEndian>(window.rect.height as u16)?;
        }

        self.put_segment(pts, 0x17, &payload)
    }

    fn put_pds(&mut self, pts: u64, composition: &Composition) -> WriteResult<()> {

        let mut payload = vec![];

        payload.write_u8(composition.palette.id())?;
        payload.write_u8(composition.palette.version())?;

        for entry in composition.palette.entries() {
            payload.write_u8(entry.id)?;
            payload.write_u8(entry.y)?;
            payload.write_u8(entry.cr)?;
            payload.write_u8(entry.cb)?;
            payload.write_u8(entry.alpha)?;
        }

        self.put_segment(pts, 0x14, &payload)
    }

    fn put_ods(&mut self, pts: u64, object: &ObjectBuffer) -> WriteResult<()> {

        let data = object.data();

        if data.len() > MAX_OBJECT_DATA_SIZE {
            return Err(WriteError::ObjectDataTooLarge)
        }

        if data.len() <= FIRST_CHUNK_SIZE {
            self.put_ods_chunk(pts, object, 0xC0, Some(data.len()), data)
        } else {

            let mut index = FIRST_CHUNK_SIZE;

            self.put_ods_chunk(pts, object, 0x80, Some(data.len()), &data[..index])?;

            while data.len() - index > NEXT_CHUNK_SIZE {
                self.put_ods_chunk(
                    pts, object, 0x00, None, &data[index..(index + NEXT_CHUNK_SIZE)],
                )?;
                index += NEXT_CHUNK_SIZE;
            }

            self.put_ods_chunk(pts, object, 0x40, None, &data[index..])
        }
    }

    fn put_ods_chunk(
        &mut self,
        pts: u64,
        object: &ObjectBuffer,
        sequence: u8,
        total_size: Option<usize>,
        chunk: &[u8],
    ) -> WriteResult<()> {

        let mut payload = vec![];

        payload.write_u16::<BigEndian>(object.id())?;
        payload.write_u8(object.version())?;
        payload.write_u8(sequence)?;

        if let Some(total_size) = total_size {
            payload.write_u24::<BigEndian>(total_size as u32 + 4)?;
            payload.write_u16::<BigEndian>(object.width() as u16)?;
            payload.write_u16::<BigEndian>(object.height() as u16)?;
        }

        payload.write_all(chunk)?;

        self.put_segment(pts, 0x15, &payload)
    }

    fn put_end(&mut self, pts: u64) -> WriteResult<()> {
        self.put_segment(pts, 0x80, &[])
    }

    fn put_segment(&mut self, pts: u64, kind: u8, payload: &[u8]) -> WriteResult<()> {

        self.sink.write_u16::<BigEndian>(0x5047)?;
        self.sink.write_u32::<BigEndian>(pts as u32)?;
        self.sink.write_u32::<BigEndian>(0)?;
        self.sink.write_u8(kind)?;
        self.sink.write_u16::<BigEndian>(payload.len() as u16)?;
        self.sink.write_all(payload)?;

        Ok(())
    }
}

impl<W: Write> StreamWriter for PgsStreamWriter<W> {

    fn start_epoch(&mut self, windows: &WindowDescriptor) -> EncodeResult<()> {

        // The WDS needs the first composition's PTS, so serialization is deferred until then.

        self.windows = Some(windows.clone());
        self.epoch_open = true;

        Ok(())
    }

    fn write_composition(&mut self, composition: &Composition) -> EncodeResult<()> {

        self.put_composition(composition)?;

        trace!("wrote composition at PTS={}", ts_to_timestamp(composition.pts));

        Ok(())
    }

    fn ignore_composition(&mut self, pts: u64, ets: u64) -> EncodeResult<()> {

        warn!(
            "dropped composition covering PTS={} to ETS={}",
            ts_to_timestamp(pts),
            ts_to_timestamp(ets),
        );

        self.skipped.push((pts, ets));
        self.last_ets = Some(ets);

        Ok(())
    }

    fn end_epoch(&mut self) -> EncodeResult<()> {

        if self.windows.is_none() {
            return Err(WriteError::EpochNotStarted.into())
        }

        // Clear the screen at the point the last composition leaves it.

        let pts = self.last_ets.take().unwrap_or(0);

        self.put_clearing_composition(pts)?;
        self.windows = None;
        self.epoch_open = false;

        Ok(())
    }
}
