//! Scratch pools for the formatting hot path
//!
//! Formatters check out a byte buffer, a key slice, and a visited set per
//! call and return them on drop. `crossbeam-queue` keeps checkout and
//! checkin contention-free across route consumers. Checkin either clears
//! the resource or discards its contents outright, so nothing from one
//! record can leak into the next.

use crossbeam_queue::SegQueue;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

struct Shelves {
    bufs: SegQueue<Vec<u8>>,
    key_capacities: SegQueue<usize>,
    visited: SegQueue<HashSet<usize>>,
}

static SHELVES: OnceLock<Shelves> = OnceLock::new();

fn shelves() -> &'static Shelves {
    SHELVES.get_or_init(|| Shelves {
        bufs: SegQueue::new(),
        key_capacities: SegQueue::new(),
        visited: SegQueue::new(),
    })
}

/// Pooled byte buffer; returns itself (cleared) to the pool on drop.
pub(crate) struct ScratchBuf {
    buf: Vec<u8>,
}

impl ScratchBuf {
    pub fn checkout() -> Self {
        Self {
            buf: shelves().bufs.pop().unwrap_or_default(),
        }
    }

    /// Copy the rendered bytes out, leaving the buffer to be recycled.
    pub fn copy_out(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

impl Drop for ScratchBuf {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        shelves().bufs.push(buf);
    }
}

impl Deref for ScratchBuf {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for ScratchBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// Key slice used for sorting a map's keys before rendering.
///
/// The slice borrows the record under format, so the vec itself cannot be
/// parked in a static pool; the pool remembers prior capacities instead and
/// each checkout preallocates to one, so steady-state calls skip the grow
/// path.
pub(crate) struct KeyScratch<'a> {
    keys: Vec<&'a str>,
}

impl<'a> KeyScratch<'a> {
    pub fn checkout() -> Self {
        Self {
            keys: Vec::with_capacity(shelves().key_capacities.pop().unwrap_or(0)),
        }
    }
}

impl<'a> Drop for KeyScratch<'a> {
    fn drop(&mut self) {
        shelves().key_capacities.push(self.keys.capacity());
    }
}

impl<'a> Deref for KeyScratch<'a> {
    type Target = Vec<&'a str>;
    fn deref(&self) -> &Self::Target {
        &self.keys
    }
}

impl<'a> DerefMut for KeyScratch<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.keys
    }
}

/// Pooled identity set used for cycle detection during one format call.
pub(crate) struct VisitedScratch {
    set: HashSet<usize>,
}

impl VisitedScratch {
    pub fn checkout() -> Self {
        Self {
            set: shelves().visited.pop().unwrap_or_default(),
        }
    }

    /// Mark an identity as on the current path. Returns false when it
    /// already is, which signals a cycle.
    pub fn enter(&mut self, id: usize) -> bool {
        self.set.insert(id)
    }

    /// Unmark on the normal exit path, so diamond-shaped sharing renders
    /// fully instead of truncating.
    pub fn leave(&mut self, id: usize) {
        self.set.remove(&id);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Drop for VisitedScratch {
    fn drop(&mut self) {
        let mut set = std::mem::take(&mut self.set);
        set.clear();
        shelves().visited.push(set);
    }
}
