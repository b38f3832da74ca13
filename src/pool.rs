/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Capacity-bounded slots for compressed objects and palettes.
//!
//! Slots are handed out as [`Rc`] handles. A slot stays pinned for as long as any composition
//! still references it; once the last handle outside the pool is dropped, the slot becomes a
//! candidate for eviction. The pool never evicts a pinned slot, so an allocation that cannot
//! be satisfied even after evicting every unpinned slot fails with
//! [`PoolError::Exhausted`].


use super::codec::PaletteEntry;
use log::trace;
use std::rc::Rc;
use thiserror::Error as ThisError;

/// Number of palette slots a PGS decoder provides.
pub const PALETTE_SLOTS: usize = 8;

/// Number of distinct object ids the pool cycles through.
pub const OBJECT_IDS: u16 = 64;

/// A specialized [`Result`](std::result::Result) type for pool allocations.
pub type PoolResult<T> = Result<T, PoolError>;

/// The error type for failed pool allocations.
///
/// Both variants are recoverable at composition granularity: the pipeline skips the
/// composition that could not be allocated and carries on with the rest of the epoch.
#[derive(ThisError, Debug)]
pub enum PoolError {
    /// The request could not be satisfied even after evicting every unpinned object slot.
    #[error("object buffer pool exhausted: {requested} bytes requested, {available} free")]
    Exhausted {
        requested: usize,
        available: usize,
    },
    /// Every palette slot is still referenced by a live composition.
    #[error("all palette slots are referenced")]
    PalettesExhausted,
}

/// One compressed bitmap held by the pool.
#[derive(Debug)]
pub struct ObjectBuffer {
    id: u16,
    version: u8,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ObjectBuffer {

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One palette held by the pool.
#[derive(Debug)]
pub struct PaletteBuffer {
    id: u8,
    version: u8,
    entries: Vec<PaletteEntry>,
}

impl PaletteBuffer {

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }
}

/// A byte-capacity-bounded pool of object and palette slots.
pub struct BufferPool {
    capacity: usize,
    objects: Vec<Rc<ObjectBuffer>>,
    object_versions: [u8; OBJECT_IDS as usize],
    next_object_id: u16,
    palettes: Vec<Option<Rc<PaletteBuffer>>>,
    palette_versions: [u8; PALETTE_SLOTS],
}

impl BufferPool {

    /// Creates a pool bounded to `capacity` bytes of compressed object data.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            objects: Vec::new(),
            object_versions: [0; OBJECT_IDS as usize],
            next_object_id: 0,
            palettes: vec![None; PALETTE_SLOTS],
            palette_versions: [0; PALETTE_SLOTS],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of bytes currently held by object slots.
    pub fn in_use(&self) -> usize {
        self.objects.iter().map(|object| object.data.len()).sum()
    }

    /// Stores compressed object data in a new slot, evicting unpinned slots oldest-first if
    /// the pool is over capacity.
    pub fn allocate_object(
        &mut self,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> PoolResult<Rc<ObjectBuffer>> {

        let requested = data.len();

        while self.in_use() + requested > self.capacity {
            match self.objects.iter().position(|object| Rc::strong_count(object) == 1) {
                Some(at) => {
                    let evicted = self.objects.remove(at);
                    trace!("evicted object {} ({} bytes)", evicted.id, evicted.data.len());
                }
                None => {
                    return Err(PoolError::Exhausted {
                        requested,
                        available: self.capacity.saturating_sub(self.in_use()),
                    })
                }
            }
        }

        let id = self.next_object_id;
        let version = self.object_versions[id as usize];

        self.next_object_id = (self.next_object_id + 1) % OBJECT_IDS;
        self.object_versions[id as usize] = version.wrapping_add(1);

        let buffer = Rc::new(ObjectBuffer { id, version, width, height, data });

        self.objects.push(Rc::clone(&buffer));

        Ok(buffer)
    }

    /// Stores palette entries in the first unpinned palette slot, bumping its version.
    pub fn allocate_palette(
        &mut self,
        entries: Vec<PaletteEntry>,
    ) -> PoolResult<Rc<PaletteBuffer>> {

        let slot = self.palettes.iter().position(|palette| match palette {
            Some(held) => Rc::strong_count(held) == 1,
            None => true,
        });
        let slot = match slot {
            Some(slot) => slot,
            None => return Err(PoolError::PalettesExhausted),
        };
        let version = self.palette_versions[slot];

        self.palette_versions[slot] = version.wrapping_add(1);

        let buffer = Rc::new(PaletteBuffer { id: slot as u8, version, entries });

        self.palettes[slot] = Some(Rc::clone(&buffer));

        Ok(buffer)
    }
}
