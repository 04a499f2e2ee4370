// Copyright (c) 2026 the flatwire developers
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Segment arenas.
//!
//! An arena owns the set of segments making up one message and resolves
//! segment ids for far-pointer chasing. The reader arena layers the
//! traversal limiter, bounds checks, and validation-failure recording over
//! an arbitrary segment source; the builder arena additionally
//! bump-allocates words and grows the segment set on demand.

use core::cell::RefCell;
use core::slice;

use crate::internal::read_limiter::ReadLimiter;
use crate::internal::units::*;
use crate::message;
use crate::message::{Allocator, ReaderSegments, ValidationMode};
use crate::OutputSegments;
use crate::{Error, ErrorKind, Result};

pub type SegmentId = u32;

pub trait ReaderArena {
    /// Returns a pointer to the start of the segment and its length in
    /// words.
    fn get_segment(&self, id: u32) -> Result<(*const u8, u32)>;

    /// Applies a word offset to `start`, verifying that the result stays
    /// within the segment.
    ///
    /// # Safety
    ///
    /// `start` must point into the segment identified by `segment_id`.
    unsafe fn check_offset(
        &self,
        segment_id: u32,
        start: *const u8,
        offset_in_words: i32,
    ) -> Result<*const u8>;

    /// Verifies that `size_in_words` words starting at `start` lie wholly
    /// within the segment, and charges them against the traversal limit.
    fn contains_interval(&self, segment_id: u32, start: *const u8, size_in_words: usize)
        -> Result<()>;

    /// Charges the traversal limit for data that exists only virtually,
    /// such as the elements of a list of zero-sized structs.
    fn amplified_read(&self, virtual_amount: u64) -> Result<()>;

    /// Refunds previously-charged words. Used by sizing traversals that the
    /// caller is about to repeat.
    fn unread(&self, amount: u64);

    /// Disposes of a validation failure found in the data. When the arena
    /// recovers from failures, the error is recorded (the first one wins)
    /// and `Ok(())` comes back so that the caller substitutes a default
    /// value; otherwise the error is handed back to fail the accessor.
    fn recoverable(&self, err: Error) -> Result<()>;

    fn nesting_limit(&self) -> i32;
}

pub struct ReaderArenaImpl<S> {
    segments: S,
    read_limiter: ReadLimiter,
    nesting_limit: i32,
    validation_mode: ValidationMode,
    first_error: RefCell<Option<Error>>,
}

impl<S: ReaderSegments> ReaderArenaImpl<S> {
    pub fn new(segments: S, options: message::ReaderOptions) -> Self {
        Self {
            segments,
            read_limiter: ReadLimiter::new(options.traversal_limit_in_words),
            nesting_limit: options.nesting_limit,
            validation_mode: options.validation_mode,
            first_error: RefCell::new(None),
        }
    }

    pub fn into_segments(self) -> S {
        self.segments
    }

    /// The first validation failure recorded while reading, if any.
    pub fn validation_error(&self) -> Option<Error> {
        self.first_error.borrow().clone()
    }

    /// Resolves a segment id to its byte range, as (start, length in
    /// words).
    fn segment_range(&self, id: u32) -> Result<(usize, usize)> {
        let (start, len_words) = self.get_segment(id)?;
        Ok((start as usize, len_words as usize * BYTES_PER_WORD))
    }
}

impl<S: ReaderSegments> ReaderArena for ReaderArenaImpl<S> {
    fn get_segment(&self, id: u32) -> Result<(*const u8, u32)> {
        let Some(seg) = self.segments.get_segment(id) else {
            return Err(Error::from_kind(ErrorKind::InvalidSegmentId(id)));
        };
        if seg.as_ptr() as usize % BYTES_PER_WORD != 0 {
            return Err(Error::from_kind(ErrorKind::UnalignedSegment));
        }
        Ok((seg.as_ptr(), (seg.len() / BYTES_PER_WORD) as u32))
    }

    unsafe fn check_offset(
        &self,
        segment_id: u32,
        start: *const u8,
        offset_in_words: i32,
    ) -> Result<*const u8> {
        let (segment_start, segment_bytes) = self.segment_range(segment_id)?;
        let out_of_bounds = || Error::from_kind(ErrorKind::PointerOutOfBounds);

        let base = (start as usize)
            .checked_sub(segment_start)
            .ok_or_else(out_of_bounds)? as i64;
        let target = base + i64::from(offset_in_words) * BYTES_PER_WORD as i64;
        if target < 0 || target > segment_bytes as i64 {
            Err(out_of_bounds())
        } else {
            unsafe { Ok(start.offset((target - base) as isize)) }
        }
    }

    fn contains_interval(&self, id: u32, start: *const u8, size_in_words: usize) -> Result<()> {
        let (segment_start, segment_bytes) = self.segment_range(id)?;
        let out_of_bounds = || Error::from_kind(ErrorKind::PointerOutOfBounds);

        let offset = (start as usize)
            .checked_sub(segment_start)
            .ok_or_else(out_of_bounds)?;
        if offset + size_in_words * BYTES_PER_WORD > segment_bytes {
            return Err(out_of_bounds());
        }
        self.read_limiter.can_read(size_in_words)
    }

    fn amplified_read(&self, virtual_amount: u64) -> Result<()> {
        self.read_limiter.can_read(virtual_amount as usize)
    }

    fn unread(&self, amount: u64) {
        self.read_limiter.unread(amount as usize);
    }

    fn recoverable(&self, err: Error) -> Result<()> {
        match self.validation_mode {
            ValidationMode::RecoverWithDefaults => {
                let mut slot = self.first_error.borrow_mut();
                if slot.is_none() {
                    *slot = Some(err);
                }
                Ok(())
            }
            ValidationMode::Strict => Err(err),
        }
    }

    fn nesting_limit(&self) -> i32 {
        self.nesting_limit
    }
}

pub trait BuilderArena: ReaderArena {
    /// Bump-allocates `amount` words in the given segment, returning the
    /// word index of the allocation, or `None` if the segment is full.
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Option<u32>;

    /// Allocates `amount` words in any segment with room, creating a new
    /// segment if necessary.
    fn allocate_anywhere(&mut self, amount: u32) -> (SegmentId, u32);

    fn get_segment_mut(&mut self, id: u32) -> (*mut u8, u32);

    fn as_reader(&self) -> &dyn ReaderArena;
}

/// One segment under construction.
struct BuilderSegment {
    ptr: *mut u8,

    /// Words the segment could hold.
    capacity: u32,

    /// Words already handed out.
    allocated: u32,
}

impl BuilderSegment {
    fn try_allocate(&mut self, amount: u32) -> Option<u32> {
        let remaining = self.capacity - self.allocated;
        if amount > remaining {
            return None;
        }
        let word_idx = self.allocated;
        self.allocated += amount;
        Some(word_idx)
    }

    /// The allocated prefix as a byte slice.
    ///
    /// # Safety
    ///
    /// The caller must pick a lifetime during which no builder mutates the
    /// segment. Handing the slice out under the arena's own borrow is safe:
    /// mutation requires a mutable borrow of the message builder, which
    /// cannot coexist with it.
    unsafe fn allocated_bytes<'a>(&self) -> &'a [u8] {
        slice::from_raw_parts(self.ptr as *const u8, self.allocated as usize * BYTES_PER_WORD)
    }
}

pub struct BuilderArenaImpl<A: Allocator> {
    allocator: A,
    segments: Vec<BuilderSegment>,
}

impl<A: Allocator> BuilderArenaImpl<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            segments: Vec::new(),
        }
    }

    /// Adds a segment with capacity for at least `minimum_size` words.
    pub fn allocate_segment(&mut self, minimum_size: u32) {
        let (ptr, capacity) = self.allocator.allocate_segment(minimum_size);
        self.segments.push(BuilderSegment {
            ptr,
            capacity,
            allocated: 0,
        });
    }

    pub fn get_segments_for_output(&self) -> OutputSegments {
        match &self.segments[..] {
            [] => {
                // Nothing was ever allocated; present one empty segment so
                // that serialization still produces a valid (if vacuous)
                // message.
                OutputSegments::SingleSegment([&[]])
            }
            [only] => OutputSegments::SingleSegment([unsafe { only.allocated_bytes() }]),
            many => OutputSegments::MultiSegment(
                many.iter().map(|seg| unsafe { seg.allocated_bytes() }).collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl<A: Allocator> Drop for BuilderArenaImpl<A> {
    fn drop(&mut self) {
        let segment0_words = self.segments.first().map_or(0, |s| s.allocated);
        self.allocator.pre_drop(segment0_words);
    }
}

impl<A: Allocator> ReaderArena for BuilderArenaImpl<A> {
    fn get_segment(&self, id: u32) -> Result<(*const u8, u32)> {
        let seg = &self.segments[id as usize];
        Ok((seg.ptr, seg.allocated))
    }

    unsafe fn check_offset(
        &self,
        _segment_id: u32,
        start: *const u8,
        offset_in_words: i32,
    ) -> Result<*const u8> {
        // A builder's own pointers are well-formed by construction.
        unsafe { Ok(start.offset((i64::from(offset_in_words) * BYTES_PER_WORD as i64) as isize)) }
    }

    fn contains_interval(&self, _id: u32, _start: *const u8, _size: usize) -> Result<()> {
        Ok(())
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn unread(&self, _amount: u64) {}

    fn recoverable(&self, err: Error) -> Result<()> {
        // A validation failure in a builder's own data is a bug; surface
        // it rather than papering over it with defaults.
        Err(err)
    }

    fn nesting_limit(&self) -> i32 {
        i32::MAX
    }
}

impl<A: Allocator> BuilderArena for BuilderArenaImpl<A> {
    fn allocate(&mut self, segment_id: u32, amount: WordCount32) -> Option<u32> {
        self.segments[segment_id as usize].try_allocate(amount)
    }

    fn allocate_anywhere(&mut self, amount: u32) -> (SegmentId, u32) {
        // Try the existing segments before growing the arena.
        for (id, seg) in self.segments.iter_mut().enumerate() {
            if let Some(word_idx) = seg.try_allocate(amount) {
                return (id as u32, word_idx);
            }
        }

        let id = self.segments.len() as u32;
        self.allocate_segment(amount);
        let word_idx = self
            .allocate(id, amount)
            .expect("fresh segment must hold its minimum size");
        (id, word_idx)
    }

    fn get_segment_mut(&mut self, id: u32) -> (*mut u8, u32) {
        let seg = &self.segments[id as usize];
        (seg.ptr, seg.capacity)
    }

    fn as_reader(&self) -> &dyn ReaderArena {
        self
    }
}

/// The arena behind default-value blobs: no segments, no limits, no
/// recovery (the blobs are trusted, so a failure in one is a bug).
pub struct NullArena;

impl ReaderArena for NullArena {
    fn get_segment(&self, _id: u32) -> Result<(*const u8, u32)> {
        Err(Error::from_kind(ErrorKind::ReadFromNullArena))
    }

    unsafe fn check_offset(
        &self,
        _segment_id: u32,
        start: *const u8,
        offset_in_words: i32,
    ) -> Result<*const u8> {
        unsafe { Ok(start.add(offset_in_words as usize * BYTES_PER_WORD)) }
    }

    fn contains_interval(&self, _id: u32, _start: *const u8, _size: usize) -> Result<()> {
        Ok(())
    }

    fn amplified_read(&self, _virtual_amount: u64) -> Result<()> {
        Ok(())
    }

    fn unread(&self, _amount: u64) {}

    fn recoverable(&self, err: Error) -> Result<()> {
        Err(err)
    }

    fn nesting_limit(&self) -> i32 {
        i32::MAX
    }
}
