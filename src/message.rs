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

//! Untyped root containers for messages.
//!
//! A [`Reader`] wraps a set of segments and hands out typed views of the
//! root pointer; a [`Builder`] owns a growable arena and hands out typed
//! builders of the root. Neither ever parses or copies message content.

use crate::any_pointer;
use crate::internal::arena::{BuilderArena, BuilderArenaImpl, ReaderArena, ReaderArenaImpl};
use crate::internal::layout;
use crate::traits::{FromPointerBuilder, FromPointerReader, Owned, SetPointerBuilder};
use crate::{Error, OutputSegments, Result, Word};

/// How validation failures in the message data are handled while reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Record the first failure and substitute default values, so that
    /// reads of a damaged or over-limit message degrade instead of
    /// failing. The recorded error can be inspected with
    /// [`Reader::validation_error`]. This is the default.
    #[default]
    RecoverWithDefaults,

    /// Fail the accessor that first detects a problem.
    Strict,
}

/// Options controlling how data is read.
#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    /// Limits how many total words of data may be traversed. Traversal is
    /// counted every time a struct or list reader is obtained, so reading
    /// the same sub-object twice counts it twice.
    ///
    /// This is a defense against denial of service: a small message whose
    /// pointers all converge on the same location would otherwise cost an
    /// attacker a few bytes and the receiver unbounded work. Set it
    /// comfortably above the size of messages you expect. Once the limit
    /// is exhausted, further reads behave like reads of a damaged message:
    /// they yield default values (or errors, under
    /// [`ValidationMode::Strict`]).
    ///
    /// `None` means no limit, which is only appropriate for trusted data
    /// (readers over your own builders use it).
    pub traversal_limit_in_words: Option<usize>,

    /// Limits how deeply nested a message is allowed to be, guarding the
    /// stack against hand-crafted deeply-recursive (or cyclic) messages.
    /// A descend past the limit yields a defaulted value (or an error,
    /// under [`ValidationMode::Strict`]).
    pub nesting_limit: i32,

    /// What happens when the data fails validation: substitute defaults
    /// and record the error, or fail the accessor.
    pub validation_mode: ValidationMode,
}

pub const DEFAULT_READER_OPTIONS: ReaderOptions = ReaderOptions {
    traversal_limit_in_words: Some(8 * 1024 * 1024),
    nesting_limit: 64,
    validation_mode: ValidationMode::RecoverWithDefaults,
};

impl Default for ReaderOptions {
    fn default() -> Self {
        DEFAULT_READER_OPTIONS
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        DEFAULT_READER_OPTIONS
    }

    pub fn nesting_limit(&mut self, value: i32) -> &mut Self {
        self.nesting_limit = value;
        self
    }

    pub fn traversal_limit_in_words(&mut self, value: Option<usize>) -> &mut Self {
        self.traversal_limit_in_words = value;
        self
    }

    pub fn validation_mode(&mut self, value: ValidationMode) -> &mut Self {
        self.validation_mode = value;
        self
    }
}

/// A source of segments backing a message reader.
///
/// Segment buffers must be 8-byte aligned; reads through a misaligned
/// segment fail with `UnalignedSegment`.
pub trait ReaderSegments {
    /// Gets the segment with the given id, or `None` if out of range.
    fn get_segment(&self, id: u32) -> Option<&[u8]>;

    /// The number of segments.
    fn len(&self) -> usize {
        for i in 0.. {
            if self.get_segment(i as u32).is_none() {
                return i;
            }
        }
        unreachable!()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A borrowed array of segments.
pub struct SegmentArray<'a> {
    segments: &'a [&'a [u8]],
}

impl<'a> SegmentArray<'a> {
    pub fn new(segments: &'a [&'a [u8]]) -> SegmentArray<'a> {
        SegmentArray { segments }
    }
}

impl<'b> ReaderSegments for SegmentArray<'b> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.segments.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.segments.len()
    }
}

impl<'b> ReaderSegments for [&'b [u8]] {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.len()
    }
}

/// A container for reading a message.
pub struct Reader<S>
where
    S: ReaderSegments,
{
    arena: ReaderArenaImpl<S>,
    nesting_limit: i32,
}

impl<S> core::fmt::Debug for Reader<S>
where
    S: ReaderSegments,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reader").finish()
    }
}

impl<S> Reader<S>
where
    S: ReaderSegments,
{
    pub fn new(segments: S, options: ReaderOptions) -> Self {
        Self {
            arena: ReaderArenaImpl::new(segments, options),
            nesting_limit: options.nesting_limit,
        }
    }

    fn get_root_internal(&self) -> Result<any_pointer::Reader<'_>> {
        let (segment_start, _seg_len) = self.arena.get_segment(0)?;
        let pointer_reader =
            layout::PointerReader::get_root(&self.arena, 0, segment_start, self.nesting_limit)?;
        Ok(any_pointer::Reader::new(pointer_reader))
    }

    /// Gets the root of the message, interpreting it as the given type.
    pub fn get_root<'a, T: FromPointerReader<'a>>(&'a self) -> Result<T> {
        self.get_root_internal()?.get_as()
    }

    /// The first validation failure recorded while reading this message,
    /// if any. Only populated under
    /// [`ValidationMode::RecoverWithDefaults`]; strict readers surface the
    /// failure from the accessor instead.
    pub fn validation_error(&self) -> Option<Error> {
        self.arena.validation_error()
    }

    pub fn into_segments(self) -> S {
        self.arena.into_segments()
    }

    pub fn into_typed<T: Owned>(self) -> TypedReader<S, T> {
        TypedReader::new(self)
    }
}

/// A message reader whose root is statically known to be of type `T`.
pub struct TypedReader<S, T>
where
    S: ReaderSegments,
    T: Owned,
{
    marker: core::marker::PhantomData<T>,
    message: Reader<S>,
}

impl<S, T> TypedReader<S, T>
where
    S: ReaderSegments,
    T: Owned,
{
    pub fn new(message: Reader<S>) -> Self {
        Self {
            marker: core::marker::PhantomData,
            message,
        }
    }

    pub fn get(&self) -> Result<T::Reader<'_>> {
        self.message.get_root()
    }

    pub fn into_inner(self) -> Reader<S> {
        self.message
    }
}

impl<S, T> From<Reader<S>> for TypedReader<S, T>
where
    S: ReaderSegments,
    T: Owned,
{
    fn from(message: Reader<S>) -> Self {
        Self::new(message)
    }
}

/// Supplies zeroed memory for a message under construction.
///
/// # Safety
///
/// The returned memory must be zeroed, 8-byte aligned, and must stay valid
/// and stable until `pre_drop` (memory is released by dropping the
/// allocator itself).
pub unsafe trait Allocator {
    /// Allocates a segment of at least `minimum_size` words, returning its
    /// start and actual size in words.
    fn allocate_segment(&mut self, minimum_size: u32) -> (*mut u8, u32);

    /// Called when the arena is dropped, with the number of words used in
    /// segment 0. Gives reusable allocators a chance to scrub.
    fn pre_drop(&mut self, _segment0_currently_allocated: u32) {}
}

/// A container for building a message.
pub struct Builder<A>
where
    A: Allocator,
{
    arena: BuilderArenaImpl<A>,
}

// The arena's raw segment pointers all point into memory owned by the
// allocator, which moves together with the builder.
unsafe impl<A: Allocator + Send> Send for Builder<A> {}

fn _assert_kinds() {
    fn _assert_send<T: Send>() {}
    fn _assert_builder<A: Allocator + Send>() {
        _assert_send::<Builder<A>>();
    }
}

impl<A> Builder<A>
where
    A: Allocator,
{
    pub fn new(allocator: A) -> Self {
        Self {
            arena: BuilderArenaImpl::new(allocator),
        }
    }

    fn get_root_internal(&mut self) -> any_pointer::Builder<'_> {
        if self.arena.is_empty() {
            self.arena.allocate_segment(1);
            self.arena
                .allocate(0, 1)
                .expect("allocate root pointer");
        }
        let (seg_start, _seg_len) = self.arena.get_segment_mut(0);
        any_pointer::Builder::new(layout::PointerBuilder::get_root(&mut self.arena, 0, seg_start))
    }

    /// Initializes the root as a value of the given type.
    pub fn init_root<'a, T: FromPointerBuilder<'a>>(&'a mut self) -> T {
        self.get_root_internal().init_as()
    }

    /// Gets the root, interpreting it as the given type.
    pub fn get_root<'a, T: FromPointerBuilder<'a>>(&'a mut self) -> Result<T> {
        self.get_root_internal().get_as()
    }

    pub fn get_root_as_reader<'a, T: FromPointerReader<'a>>(&'a self) -> Result<T> {
        if self.arena.is_empty() {
            any_pointer::Reader::new(layout::PointerReader::new_default()).get_as()
        } else {
            let (segment_start, _segment_len) = self.arena.get_segment(0)?;
            let pointer_reader =
                layout::PointerReader::get_root(&self.arena, 0, segment_start, i32::MAX)?;
            any_pointer::Reader::new(pointer_reader).get_as()
        }
    }

    /// Sets the root to a deep copy of the given value.
    pub fn set_root<T: SetPointerBuilder>(&mut self, value: T) -> Result<()> {
        self.get_root_internal().set_as(value)
    }

    pub fn get_segments_for_output(&self) -> OutputSegments {
        self.arena.get_segments_for_output()
    }

    pub fn into_reader(self) -> Reader<Self> {
        Reader::new(
            self,
            ReaderOptions {
                traversal_limit_in_words: None,
                nesting_limit: i32::MAX,
                validation_mode: ValidationMode::RecoverWithDefaults,
            },
        )
    }
}

impl<A> ReaderSegments for Builder<A>
where
    A: Allocator,
{
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.get_segments_for_output().get(id as usize).copied()
    }

    fn len(&self) -> usize {
        self.get_segments_for_output().len()
    }
}

/// The standard allocator: each segment is a zeroed `Vec` on the heap.
#[derive(Debug)]
pub struct HeapAllocator {
    owned_memory: Vec<Vec<Word>>,
    next_size: u32,
    allocation_strategy: AllocationStrategy,
}

#[derive(Clone, Copy, Debug)]
pub enum AllocationStrategy {
    /// Every segment gets the configured size (or the requested size, if
    /// larger). Chiefly useful for tests that want to force segment
    /// boundaries.
    FixedSize,

    /// Each new segment doubles the budget, so a message of any size ends
    /// up with O(log n) segments.
    GrowHeuristically,
}

pub const SUGGESTED_FIRST_SEGMENT_WORDS: u32 = 1024;
pub const SUGGESTED_ALLOCATION_STRATEGY: AllocationStrategy = AllocationStrategy::GrowHeuristically;

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            owned_memory: Vec::new(),
            next_size: SUGGESTED_FIRST_SEGMENT_WORDS,
            allocation_strategy: SUGGESTED_ALLOCATION_STRATEGY,
        }
    }

    pub fn first_segment_words(mut self, value: u32) -> Self {
        self.next_size = value;
        self
    }

    pub fn allocation_strategy(mut self, value: AllocationStrategy) -> Self {
        self.allocation_strategy = value;
        self
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Allocator for HeapAllocator {
    fn allocate_segment(&mut self, minimum_size: u32) -> (*mut u8, u32) {
        let size = minimum_size.max(self.next_size);
        let mut new_words = Word::allocate_zeroed_vec(size as usize);
        let ptr = new_words.as_mut_ptr() as *mut u8;

        // The Vec is kept alive (and never resized) for the allocator's
        // lifetime, so the pointer stays valid.
        self.owned_memory.push(new_words);

        if matches!(self.allocation_strategy, AllocationStrategy::GrowHeuristically) {
            self.next_size = self.next_size.saturating_add(size);
        }
        (ptr, size)
    }
}

impl Builder<HeapAllocator> {
    pub fn new_default() -> Self {
        Self::new(HeapAllocator::new())
    }
}

/// A caller-provided buffer to use as the first segment, letting repeated
/// small messages skip heap allocation entirely.
#[derive(Debug)]
pub struct ScratchSpace<'a> {
    slice: &'a mut [Word],
    in_use: bool,
}

impl<'a> ScratchSpace<'a> {
    pub fn new(slice: &'a mut [Word]) -> ScratchSpace<'a> {
        // Segments must start zeroed; the previous user may have left
        // content behind.
        slice.fill(crate::word(0, 0, 0, 0, 0, 0, 0, 0));
        ScratchSpace {
            slice,
            in_use: false,
        }
    }
}

pub struct ScratchSpaceHeapAllocator<'a, 'b: 'a> {
    scratch_space: &'a mut ScratchSpace<'b>,
    allocator: HeapAllocator,
}

impl<'a, 'b: 'a> ScratchSpaceHeapAllocator<'a, 'b> {
    pub fn new(scratch_space: &'a mut ScratchSpace<'b>) -> ScratchSpaceHeapAllocator<'a, 'b> {
        ScratchSpaceHeapAllocator {
            scratch_space,
            allocator: HeapAllocator::new(),
        }
    }

    pub fn second_segment_words(self, value: u32) -> ScratchSpaceHeapAllocator<'a, 'b> {
        ScratchSpaceHeapAllocator {
            scratch_space: self.scratch_space,
            allocator: self.allocator.first_segment_words(value),
        }
    }

    pub fn allocation_strategy(self, value: AllocationStrategy) -> ScratchSpaceHeapAllocator<'a, 'b> {
        ScratchSpaceHeapAllocator {
            scratch_space: self.scratch_space,
            allocator: self.allocator.allocation_strategy(value),
        }
    }
}

unsafe impl<'a, 'b: 'a> Allocator for ScratchSpaceHeapAllocator<'a, 'b> {
    fn allocate_segment(&mut self, minimum_size: u32) -> (*mut u8, u32) {
        if !self.scratch_space.in_use && minimum_size as usize <= self.scratch_space.slice.len() {
            self.scratch_space.in_use = true;
            (
                self.scratch_space.slice.as_mut_ptr() as *mut u8,
                self.scratch_space.slice.len() as u32,
            )
        } else {
            self.allocator.allocate_segment(minimum_size)
        }
    }

    fn pre_drop(&mut self, segment0_currently_allocated: u32) {
        // Zero the used prefix so the scratch buffer can back another
        // message.
        if self.scratch_space.in_use {
            for word in &mut self.scratch_space.slice[..segment0_currently_allocated as usize] {
                *word = crate::word(0, 0, 0, 0, 0, 0, 0, 0);
            }
            self.scratch_space.in_use = false;
        }
    }
}
