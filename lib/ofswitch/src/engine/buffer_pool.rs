// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The packet-buffer pool.
//!
//! A fixed ring of slots holds frames the controller may want back:
//! the opaque id it sees packs the slot index with a per-slot cookie
//! so a stale id cannot retrieve a newer occupant. The mutex guards
//! only cursor and slot bookkeeping; an evicted frame is dropped
//! after the lock is released.

use crate::engine::packet::Frame;
use crate::time::Moment;
use crate::SwitchError;
use parking_lot::Mutex;
use std::time::Duration;

/// Ring size; must match the index mask below.
pub const N_PKT_BUFFERS: usize = 256;

const PKT_BUFFER_BITS: u32 = 8;
const PKT_BUFFER_MASK: u32 = (N_PKT_BUFFERS as u32) - 1;

/// A fresh occupant is protected from eviction for this long.
const OVERWRITE_SECS: u64 = 1;

#[derive(Default)]
struct Slot {
    frame: Option<Frame>,
    cookie: u16,
    expires_at: Moment,
}

struct Ring {
    slots: Vec<Slot>,
    cursor: usize,
}

pub struct PacketBufferPool {
    ring: Mutex<Ring>,
}

impl PacketBufferPool {
    pub fn new() -> Self {
        let slots = (0..N_PKT_BUFFERS).map(|_| Slot::default()).collect();
        Self { ring: Mutex::new(Ring { slots, cursor: 0 }) }
    }

    /// Park `frame` and return its id, or `None` when the next slot's
    /// occupant is too fresh to evict.
    pub fn save(&self, frame: Frame, now: Moment) -> Option<u32> {
        let evicted;
        let id;

        {
            let mut ring = self.ring.lock();
            ring.cursor = (ring.cursor + 1) & PKT_BUFFER_MASK as usize;
            let cursor = ring.cursor;
            let slot = &mut ring.slots[cursor];

            if slot.frame.is_some() && now < slot.expires_at {
                return None;
            }

            evicted = slot.frame.take();
            slot.cookie = next_cookie(slot.cookie);
            slot.frame = Some(frame);
            slot.expires_at = now + Duration::from_secs(OVERWRITE_SECS);
            id = cursor as u32 | u32::from(slot.cookie) << PKT_BUFFER_BITS;
        }

        drop(evicted);
        Some(id)
    }

    /// Take the frame back. A mismatched or stale cookie means the
    /// occupant is not the packet the id referred to.
    pub fn retrieve(&self, id: u32) -> Result<Frame, SwitchError> {
        let mut ring = self.ring.lock();
        let slot = &mut ring.slots[(id & PKT_BUFFER_MASK) as usize];

        if u32::from(slot.cookie) == id >> PKT_BUFFER_BITS {
            if let Some(frame) = slot.frame.take() {
                return Ok(frame);
            }
        }

        Err(SwitchError::BufferUnknown(id))
    }

    /// Drop the frame an id refers to, if it is still resident.
    pub fn discard(&self, id: u32) {
        let freed;

        {
            let mut ring = self.ring.lock();
            let slot = &mut ring.slots[(id & PKT_BUFFER_MASK) as usize];
            if u32::from(slot.cookie) != id >> PKT_BUFFER_BITS {
                return;
            }
            freed = slot.frame.take();
        }

        drop(freed);
    }
}

impl Default for PacketBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Cookies wrap but skip all-ones, which is reserved so a full id of
/// all-ones can always mean "no buffer".
fn next_cookie(cookie: u16) -> u16 {
    let next = cookie.wrapping_add(1);
    if next == u16::MAX {
        0
    } else {
        next
    }
}
