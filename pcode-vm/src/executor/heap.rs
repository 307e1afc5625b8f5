//! Boundary-tagged heap allocator.
//!
//! The heap region is a chain of chunks addressed by plain byte offsets
//! relative to the heap base; no native references reach into the buffer.
//! Each chunk starts with an 8-byte header:
//!
//! ```text
//! +0  forward  (12 bits, granules to the next chunk; 0 at the terminus)
//!     in-use   (bit 12)
//! +2  back     (12 bits, granules to the previous chunk)
//! +4  address  (bytes, relative to the heap base)
//! +6  reserved
//! ```
//!
//! Free chunks additionally carry `prev`/`next` words at `+8`/`+10`,
//! forming a doubly linked list kept sorted by ascending chunk size. The
//! chain terminates in a sentinel in-use chunk of minimum size whose
//! `forward` is zero.

use super::Executor;
use crate::consts::*;

use pcode_asm::Fault;
use tracing::debug;

/// Free-list terminator; `0` is a valid chunk offset.
const NIL: u16 = 0xffff;

const IN_USE: u16 = 0x1000;
const FORWARD_MASK: u16 = 0x0fff;

/// Heap geometry and the free-list head.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Heap {
    base: u16,
    size: u16,
    free: u16,
}

impl Heap {
    pub(crate) const fn new(base: u16, size: u16) -> Self {
        Self { base, size, free: NIL }
    }
}

impl Executor {
    /// Lays the heap out as one free chunk followed by the sentinel.
    pub(crate) fn heap_init(&mut self) -> Result<(), Fault> {
        let span = self.heap.size - HEAP_MIN_CHUNK;

        self.set_chunk(0, span / HEAP_ALLOC_UNIT, 0, false)?;
        self.set_chunk(span, 0, span / HEAP_ALLOC_UNIT, true)?;

        self.heap.free = 0;
        self.set_free_links(0, NIL, NIL)
    }

    /// Allocates `size` bytes; returns the absolute payload address, or
    /// zero when no chunk can satisfy the request.
    pub(crate) fn heap_alloc(&mut self, size: u16) -> Result<u16, Fault> {
        let Some(target) = size
            .checked_add(HEAP_HEADER + HEAP_ALLOC_UNIT - 1)
            .map(|n| n & !(HEAP_ALLOC_UNIT - 1))
        else {
            return Ok(0);
        };

        // Best fit by sorted traversal: the list is ordered by size.
        let mut chunk = self.heap.free;
        while chunk != NIL {
            if self.chunk_size(chunk)? >= target {
                break;
            }
            chunk = self.free_next(chunk)?;
        }

        if chunk == NIL {
            debug!(size, "heap exhausted");
            return Ok(0);
        }

        self.free_list_remove(chunk)?;

        let total = self.chunk_size(chunk)?;
        self.set_in_use(chunk, true)?;

        if total - target >= HEAP_MIN_CHUNK {
            // Split a trailing free sub-chunk and give it back through the
            // coalescing path, so a free right neighbor merges with it.
            let rest = chunk + target;
            let next = chunk + total;

            self.set_chunk_forward(chunk, target / HEAP_ALLOC_UNIT)?;
            self.set_chunk(rest, (total - target) / HEAP_ALLOC_UNIT, target / HEAP_ALLOC_UNIT, false)?;

            if self.chunk_forward(next)? != 0 || self.chunk_in_use(next)? {
                self.set_chunk_back(next, (total - target) / HEAP_ALLOC_UNIT)?;
            }

            self.heap_coalesce(rest)?;
        }

        debug!(size, target, chunk, "heap alloc");
        Ok(self.heap.base + chunk + HEAP_HEADER)
    }

    /// Returns a payload address to the allocator.
    pub(crate) fn heap_free(&mut self, addr: u16) -> Result<(), Fault> {
        let rel = addr
            .checked_sub(self.heap.base + HEAP_HEADER)
            .filter(|rel| *rel < self.heap.size)
            .ok_or(Fault::BadAddress)?;

        if rel % HEAP_ALLOC_UNIT != 0 || self.chunk_address(rel)? != rel {
            return Err(Fault::BadAddress);
        }
        if !self.chunk_in_use(rel)? {
            return Err(Fault::DoubleFree);
        }

        self.set_in_use(rel, false)?;
        debug!(addr, rel, "heap free");
        self.heap_coalesce(rel)
    }

    /// Merges `rel` with free neighbors and inserts it into the free list.
    fn heap_coalesce(&mut self, rel: u16) -> Result<(), Fault> {
        let mut chunk = rel;

        // Fold a free left neighbor over this chunk.
        let back = self.chunk_back(chunk)?;
        if back != 0 {
            let prev = chunk - back * HEAP_ALLOC_UNIT;
            if !self.chunk_in_use(prev)? {
                self.free_list_remove(prev)?;

                let merged = self.chunk_forward(prev)? + self.chunk_forward(chunk)?;
                self.set_chunk_forward(prev, merged)?;

                let next = prev + merged * HEAP_ALLOC_UNIT;
                self.set_chunk_back(next, merged)?;

                chunk = prev;
            }
        }

        // Fold a free right neighbor into the chunk.
        let forward = self.chunk_forward(chunk)?;
        let next = chunk + forward * HEAP_ALLOC_UNIT;
        if self.chunk_forward(next)? != 0 && !self.chunk_in_use(next)? {
            self.free_list_remove(next)?;

            let merged = forward + self.chunk_forward(next)?;
            self.set_chunk_forward(chunk, merged)?;

            let after = chunk + merged * HEAP_ALLOC_UNIT;
            self.set_chunk_back(after, merged)?;
        }

        self.free_list_insert(chunk)
    }

    /// Allocates a heap-backed string buffer.
    ///
    /// Returns `(buffer address, capacity word)`; the capacity word
    /// carries [`HEAP_STRING`] so the string library can tell the buffer
    /// apart from a string-stack one.
    pub(crate) fn heap_alloc_string(&mut self, size: u16) -> Result<(u16, u16), Fault> {
        let addr = self.heap_alloc(size)?;
        if addr == 0 {
            return Err(Fault::OutOfMemory);
        }

        Ok((addr, size | HEAP_STRING))
    }

    /// The free chunks as `(relative address, size in bytes)`, in list
    /// order.
    pub fn heap_free_chunks(&self) -> Vec<(u16, u16)> {
        let mut out = Vec::new();
        let mut chunk = self.heap.free;

        while chunk != NIL {
            let size = self.chunk_size(chunk).unwrap_or(0);
            out.push((chunk, size));
            chunk = self.free_next(chunk).unwrap_or(NIL);
        }
        out
    }

    /* chunk header accessors; offsets are relative to the heap base */

    fn chunk_word(&self, rel: u16, off: u16) -> Result<u16, Fault> {
        self.word_at(self.heap.base + rel + off)
    }

    fn set_chunk_word(&mut self, rel: u16, off: u16, value: u16) -> Result<(), Fault> {
        self.set_word(self.heap.base + rel + off, value)
    }

    fn chunk_forward(&self, rel: u16) -> Result<u16, Fault> {
        Ok(self.chunk_word(rel, 0)? & FORWARD_MASK)
    }

    fn chunk_in_use(&self, rel: u16) -> Result<bool, Fault> {
        Ok(self.chunk_word(rel, 0)? & IN_USE != 0)
    }

    fn chunk_back(&self, rel: u16) -> Result<u16, Fault> {
        Ok(self.chunk_word(rel, 2)? & FORWARD_MASK)
    }

    fn chunk_address(&self, rel: u16) -> Result<u16, Fault> {
        self.chunk_word(rel, 4)
    }

    /// Chunk size in bytes; the terminus reports its minimum size.
    fn chunk_size(&self, rel: u16) -> Result<u16, Fault> {
        let forward = self.chunk_forward(rel)?;
        if forward == 0 {
            Ok(HEAP_MIN_CHUNK)
        } else {
            Ok(forward * HEAP_ALLOC_UNIT)
        }
    }

    fn set_chunk(&mut self, rel: u16, forward: u16, back: u16, in_use: bool) -> Result<(), Fault> {
        let tag = forward & FORWARD_MASK | if in_use { IN_USE } else { 0 };
        self.set_chunk_word(rel, 0, tag)?;
        self.set_chunk_word(rel, 2, back & FORWARD_MASK)?;
        self.set_chunk_word(rel, 4, rel)?;
        self.set_chunk_word(rel, 6, 0)
    }

    fn set_chunk_forward(&mut self, rel: u16, forward: u16) -> Result<(), Fault> {
        let in_use = self.chunk_word(rel, 0)? & IN_USE;
        self.set_chunk_word(rel, 0, forward & FORWARD_MASK | in_use)
    }

    fn set_chunk_back(&mut self, rel: u16, back: u16) -> Result<(), Fault> {
        self.set_chunk_word(rel, 2, back & FORWARD_MASK)
    }

    fn set_in_use(&mut self, rel: u16, in_use: bool) -> Result<(), Fault> {
        let word = self.chunk_word(rel, 0)? & !IN_USE;
        self.set_chunk_word(rel, 0, word | if in_use { IN_USE } else { 0 })
    }

    /* size-ordered free list */

    fn free_prev(&self, rel: u16) -> Result<u16, Fault> {
        self.chunk_word(rel, 8)
    }

    fn free_next(&self, rel: u16) -> Result<u16, Fault> {
        self.chunk_word(rel, 10)
    }

    fn set_free_links(&mut self, rel: u16, prev: u16, next: u16) -> Result<(), Fault> {
        self.set_chunk_word(rel, 8, prev)?;
        self.set_chunk_word(rel, 10, next)
    }

    fn free_list_remove(&mut self, rel: u16) -> Result<(), Fault> {
        let prev = self.free_prev(rel)?;
        let next = self.free_next(rel)?;

        if prev == NIL {
            self.heap.free = next;
        } else {
            self.set_chunk_word(prev, 10, next)?;
        }
        if next != NIL {
            self.set_chunk_word(next, 8, prev)?;
        }
        Ok(())
    }

    /// Inserts keeping the list sorted by non-decreasing chunk size.
    fn free_list_insert(&mut self, rel: u16) -> Result<(), Fault> {
        let size = self.chunk_size(rel)?;

        let mut prev = NIL;
        let mut cursor = self.heap.free;
        while cursor != NIL && self.chunk_size(cursor)? < size {
            prev = cursor;
            cursor = self.free_next(cursor)?;
        }

        self.set_free_links(rel, prev, cursor)?;
        if prev == NIL {
            self.heap.free = rel;
        } else {
            self.set_chunk_word(prev, 10, rel)?;
        }
        if cursor != NIL {
            self.set_chunk_word(cursor, 8, rel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MemoryLayout;
    use crate::prelude::*;

    fn machine() -> Executor {
        Executor::new(vec![Opcode::END.opcode()], &[], MemoryLayout::default()).unwrap()
    }

    /// Walks the chunk chain and checks everything the allocator
    /// promises: link consistency, coalescing completeness, list order,
    /// and full coverage of the region.
    fn verify(vm: &Executor) {
        let usable = vm.heap.size - HEAP_MIN_CHUNK;

        let mut rel = 0u16;
        let mut covered = 0u32;
        let mut prev_free = false;
        let mut prev_forward = 0u16;

        loop {
            assert_eq!(vm.chunk_address(rel).unwrap(), rel, "chunk address tag");
            assert!((rel as u32) < vm.heap.size as u32, "chunk in range");

            let forward = vm.chunk_forward(rel).unwrap();
            let in_use = vm.chunk_in_use(rel).unwrap();

            if rel != 0 {
                assert_eq!(vm.chunk_back(rel).unwrap(), prev_forward, "back matches forward");
            }
            if !in_use {
                assert!(!prev_free, "two adjacent free chunks at {rel}");
            }
            prev_free = !in_use;

            if forward == 0 {
                assert!(in_use, "terminus must be in use");
                break;
            }

            covered += forward as u32 * HEAP_ALLOC_UNIT as u32;
            prev_forward = forward;
            rel += forward * HEAP_ALLOC_UNIT;
        }

        assert_eq!(covered, usable as u32, "chunks cover the usable heap");

        let chunks = vm.heap_free_chunks();
        for pair in chunks.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "free list sorted by size");
        }
        for (rel, _) in chunks {
            assert!(!vm.chunk_in_use(rel).unwrap(), "free-listed chunk is free");
        }
    }

    #[test]
    fn fresh_heap_is_one_free_chunk() {
        let vm = machine();
        verify(&vm);

        let chunks = vm.heap_free_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], (0, vm.heap.size - HEAP_MIN_CHUNK));
    }

    #[test]
    fn alloc_free_round_trips_to_the_initial_layout() {
        let mut vm = machine();
        let before = vm.heap_free_chunks();

        let addr = vm.heap_alloc(100).unwrap();
        assert_ne!(addr, 0);
        verify(&vm);

        vm.heap_free(addr).unwrap();
        verify(&vm);
        assert_eq!(vm.heap_free_chunks(), before);
    }

    #[test]
    fn split_leaves_the_remainder_free() {
        let mut vm = machine();
        let total = vm.heap_free_chunks()[0].1;

        let addr = vm.heap_alloc(48).unwrap();
        assert_ne!(addr, 0);
        verify(&vm);

        let chunks = vm.heap_free_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].1, total - 64);
    }

    #[test]
    fn free_coalesces_both_neighbors() {
        let mut vm = machine();

        let a = vm.heap_alloc(32).unwrap();
        let b = vm.heap_alloc(32).unwrap();
        let c = vm.heap_alloc(32).unwrap();
        verify(&vm);

        vm.heap_free(a).unwrap();
        vm.heap_free(c).unwrap();
        verify(&vm);

        // Freeing the middle chunk must fuse all three with the tail.
        vm.heap_free(b).unwrap();
        verify(&vm);
        assert_eq!(vm.heap_free_chunks().len(), 1);
    }

    #[test]
    fn double_free_faults() {
        let mut vm = machine();
        let addr = vm.heap_alloc(16).unwrap();

        vm.heap_free(addr).unwrap();
        assert_eq!(vm.heap_free(addr), Err(Fault::DoubleFree));
    }

    #[test]
    fn foreign_addresses_fault() {
        let mut vm = machine();
        assert_eq!(vm.heap_free(2), Err(Fault::BadAddress));

        let inside = vm.heap.base + HEAP_HEADER + 2;
        assert_eq!(vm.heap_free(inside), Err(Fault::BadAddress));
    }

    #[test]
    fn exhaustion_returns_zero() {
        let mut vm = machine();
        assert_eq!(vm.heap_alloc(0x7000).unwrap(), 0);
        verify(&vm);
    }

    #[test]
    fn string_buffers_carry_the_heap_flag() {
        let mut vm = machine();
        let (addr, alloc) = vm.heap_alloc_string(80).unwrap();

        assert_ne!(addr, 0);
        assert_eq!(alloc, 80 | HEAP_STRING);
        assert_ne!(alloc & HEAP_STRING, 0);
    }

    #[test]
    fn interleaved_stress_holds_the_invariants() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x70617363);
        let mut vm = machine();
        let before = vm.heap_free_chunks();
        let mut live = Vec::new();

        for _ in 0..400 {
            if rng.gen_bool(0.6) || live.is_empty() {
                let size = rng.gen_range(1..=200);
                let addr = vm.heap_alloc(size).unwrap();
                if addr != 0 {
                    live.push(addr);
                }
            } else {
                let idx = rng.gen_range(0..live.len());
                let addr = live.swap_remove(idx);
                vm.heap_free(addr).unwrap();
            }
            verify(&vm);
        }

        for addr in live {
            vm.heap_free(addr).unwrap();
        }
        verify(&vm);
        assert_eq!(vm.heap_free_chunks(), before);
    }
}
