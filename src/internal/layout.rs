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

//! The layout engine.
//!
//! Everything in this module operates on *pointer locations*: a segment id
//! plus the address of one wire pointer within that segment. The free
//! functions in `wire_ops` read and write objects through such locations,
//! chasing far pointers between segments, bounds-checking every hop, and
//! zeroing storage that becomes unreachable. The reader and builder structs
//! at the bottom of the module are thin, copyable handles that generated
//! code uses to reach those operations.
//!
//! Validation failures found while reading do not escape the read
//! operations by default. Each failure is handed to the arena's
//! `recoverable` hook: an arena configured to recover records the error
//! and the operation completes with the field's default value, so that a
//! damaged or over-limit message degrades instead of failing; a strict
//! arena hands the error back and the accessor returns it.

use core::ptr;

use crate::data;
use crate::internal::arena::{BuilderArena, NullArena, ReaderArena, SegmentId};
use crate::internal::endian::{Endian, WireValue};
use crate::internal::mask::Mask;
use crate::internal::units::*;
use crate::text;
use crate::{Error, MessageSize, Result};

pub use self::ElementSize::{
    Bit, Byte, EightBytes, FourBytes, InlineComposite, Pointer, TwoBytes, Void,
};

/// On-wire element size codes for lists. The discriminants order the codes
/// by the amount of storage an element occupies, which the upgrade logic
/// relies on.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementSize {
    Void = 0,
    Bit = 1,
    Byte = 2,
    TwoBytes = 3,
    FourBytes = 4,
    EightBytes = 5,
    Pointer = 6,
    InlineComposite = 7,
}

impl ElementSize {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Void,
            1 => Self::Bit,
            2 => Self::Byte,
            3 => Self::TwoBytes,
            4 => Self::FourBytes,
            5 => Self::EightBytes,
            6 => Self::Pointer,
            7 => Self::InlineComposite,
            _ => panic!("illegal element size: {val}"),
        }
    }
}

pub fn data_bits_per_element(size: ElementSize) -> BitCount32 {
    match size {
        Void => 0,
        Bit => 1,
        Byte => 8,
        TwoBytes => 16,
        FourBytes => 32,
        EightBytes => 64,
        Pointer => 0,
        InlineComposite => 0,
    }
}

pub fn pointers_per_element(size: ElementSize) -> WirePointerCount32 {
    match size {
        Pointer => 1,
        _ => 0,
    }
}

/// The shape of a struct type, as a schema compiler would compute it.
#[derive(Clone, Copy, Debug)]
pub struct StructSize {
    pub data: WordCount16,
    pub pointers: WirePointerCount16,

    /// How a list of this struct should be encoded. Structs that fit in a
    /// single primitive value are stored as flat primitive lists; anything
    /// larger gets the tagged inline-composite encoding.
    pub preferred_list_encoding: ElementSize,
}

impl StructSize {
    pub fn total(&self) -> WordCount32 {
        u32::from(self.data) + u32::from(self.pointers) * WORDS_PER_POINTER as WordCount32
    }
}

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WirePointerKind {
    Struct = 0,
    List = 1,
    Far = 2,
    Reserved = 3,
}

impl WirePointerKind {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Struct,
            1 => Self::List,
            2 => Self::Far,
            3 => Self::Reserved,
            _ => panic!("illegal wire pointer kind: {val}"),
        }
    }
}

/// One word on the wire describing a struct, a list, or a far redirect.
///
/// The low 32 bits hold the kind (2 bits) and a signed word offset from the
/// word *following* this pointer to the target; the high 32 bits carry the
/// kind-specific size information.
#[repr(C)]
pub struct WirePointer {
    offset_and_kind: WireValue<u32>,
    upper32bits: WireValue<u32>,
}

impl WirePointer {
    #[inline]
    pub fn kind(&self) -> WirePointerKind {
        WirePointerKind::from(self.offset_and_kind.get() as u8 & 3)
    }

    /// True for struct and list pointers, whose offsets are relative to
    /// their own position. Far pointers are not positional and may be
    /// byte-copied between segments.
    #[inline]
    pub fn is_positional(&self) -> bool {
        (self.offset_and_kind.get() & 2) == 0
    }

    /// A pointer is null iff all 64 bits are zero.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.offset_and_kind.get() == 0 && self.upper32bits.get() == 0
    }

    /// The signed word offset from the word following this pointer to the
    /// target.
    ///
    /// Raw-pointer receivers here and below keep the aliasing model happy:
    /// a `&self` would assert a borrow over the whole word while the caller
    /// still holds mutable access to the segment.
    #[inline]
    unsafe fn target_offset(ptr: *const Self) -> isize {
        (1 + (((*ptr).offset_and_kind.get() as i32) >> 2)) as isize
    }

    /// Computes the target address without consulting the arena. Only valid
    /// on builder data, which is well-formed by construction.
    #[inline]
    pub unsafe fn target(ptr: *const Self) -> *const u8 {
        (ptr as *const u8).offset(Self::target_offset(ptr) * BYTES_PER_WORD as isize)
    }

    /// Computes the target address, verifying through the arena that it
    /// lies within the segment.
    #[inline]
    fn target_from_segment(
        ptr: *const Self,
        arena: &dyn ReaderArena,
        segment_id: u32,
    ) -> Result<*const u8> {
        unsafe {
            let offset = Self::target_offset(ptr);
            arena.check_offset(segment_id, ptr as *const u8, offset as i32)
        }
    }

    #[inline]
    fn mut_target(ptr: *mut Self) -> *mut u8 {
        let offset = unsafe { Self::target_offset(ptr) };
        (ptr as *mut u8).wrapping_offset(offset * BYTES_PER_WORD as isize)
    }

    #[inline]
    pub fn set_kind_and_target(&mut self, kind: WirePointerKind, target: *mut u8) {
        let this_addr: isize = self as *const _ as isize;
        let target_addr: isize = target as *const _ as isize;
        self.offset_and_kind.set(
            ((((target_addr - this_addr) / BYTES_PER_WORD as isize) as i32 - 1) << 2) as u32
                | (kind as u32),
        )
    }

    #[inline]
    pub fn set_kind_with_zero_offset(&mut self, kind: WirePointerKind) {
        self.offset_and_kind.set(kind as u32)
    }

    /// Points this pointer at an empty struct. The offset is set to -1, as
    /// if the struct were allocated immediately before the pointer, so that
    /// the word is distinguishable from a null pointer.
    #[inline]
    pub fn set_kind_and_target_for_empty_struct(&mut self) {
        self.offset_and_kind.set(0xffff_fffc);
    }

    #[inline]
    pub fn inline_composite_list_element_count(&self) -> ElementCount32 {
        self.offset_and_kind.get() >> 2
    }

    #[inline]
    pub fn set_kind_and_inline_composite_list_element_count(
        &mut self,
        kind: WirePointerKind,
        element_count: ElementCount32,
    ) {
        self.offset_and_kind
            .set((element_count << 2) | (kind as u32))
    }

    #[inline]
    pub fn far_position_in_segment(&self) -> WordCount32 {
        self.offset_and_kind.get() >> 3
    }

    #[inline]
    pub fn is_double_far(&self) -> bool {
        ((self.offset_and_kind.get() >> 2) & 1) != 0
    }

    #[inline]
    pub fn set_far(&mut self, is_double_far: bool, pos: WordCount32) {
        self.offset_and_kind
            .set((pos << 3) | (u32::from(is_double_far) << 2) | WirePointerKind::Far as u32);
    }

    #[inline]
    pub fn far_segment_id(&self) -> SegmentId {
        self.upper32bits.get() as SegmentId
    }

    #[inline]
    pub fn set_far_segment_id(&mut self, id: SegmentId) {
        self.upper32bits.set(id)
    }

    #[inline]
    pub fn struct_data_size(&self) -> WordCount16 {
        self.upper32bits.get() as WordCount16
    }

    #[inline]
    pub fn struct_ptr_count(&self) -> WirePointerCount16 {
        (self.upper32bits.get() >> 16) as WirePointerCount16
    }

    #[inline]
    pub fn struct_word_size(&self) -> WordCount32 {
        u32::from(self.struct_data_size())
            + u32::from(self.struct_ptr_count()) * WORDS_PER_POINTER as u32
    }

    #[inline]
    pub fn set_struct_size(&mut self, size: StructSize) {
        self.set_struct_size_from_pieces(size.data, size.pointers)
    }

    #[inline]
    pub fn set_struct_size_from_pieces(&mut self, data: WordCount16, pointers: WirePointerCount16) {
        self.upper32bits
            .set(u32::from(data) | (u32::from(pointers) << 16))
    }

    #[inline]
    pub fn list_element_size(&self) -> ElementSize {
        ElementSize::from(self.upper32bits.get() as u8 & 7)
    }

    #[inline]
    pub fn list_element_count(&self) -> ElementCount32 {
        self.upper32bits.get() >> 3
    }

    #[inline]
    pub fn list_inline_composite_word_count(&self) -> WordCount32 {
        self.list_element_count()
    }

    #[inline]
    pub fn set_list_size_and_count(&mut self, es: ElementSize, ec: ElementCount32) {
        assert!(ec < (1 << 29), "lists are limited to 2**29 elements");
        self.upper32bits.set((ec << 3) | (es as u32));
    }

    #[inline]
    pub fn set_list_inline_composite(&mut self, wc: WordCount32) {
        assert!(
            wc < (1 << 29),
            "inline-composite lists are limited to 2**29 words"
        );
        self.upper32bits.set((wc << 3) | (InlineComposite as u32));
    }
}

mod wire_ops {
    use core::{ptr, slice};

    use crate::data;
    use crate::internal::arena::*;
    use crate::internal::layout::ElementSize::*;
    use crate::internal::layout::{
        data_bits_per_element, pointers_per_element, ElementSize, ListBuilder, ListReader,
        ObjectBuilder, ObjectReader, StructBuilder, StructReader, StructSize, WirePointer,
        WirePointerKind,
    };
    use crate::internal::units::*;
    use crate::text;
    use crate::{Error, ErrorKind, MessageSize, Result};

    #[inline]
    pub fn round_bytes_up_to_words(bytes: ByteCount32) -> WordCount32 {
        (bytes + 7) / BYTES_PER_WORD as u32
    }

    // The maximum object is just under 4 GiB, so bit counts need 64 bits
    // but the resulting word counts always fit in 32.
    #[inline]
    pub fn round_bits_up_to_words(bits: BitCount64) -> WordCount32 {
        ((bits + 63) / (BITS_PER_WORD as u64)) as WordCount32
    }

    #[inline]
    pub fn round_bits_up_to_bytes(bits: BitCount64) -> ByteCount32 {
        ((bits + 7) / (BITS_PER_BYTE as u64)) as ByteCount32
    }

    #[inline]
    pub fn bounds_check(
        arena: &dyn ReaderArena,
        segment_id: u32,
        start: *const u8,
        size_in_words: usize,
    ) -> Result<()> {
        arena.contains_interval(segment_id, start, size_in_words)
    }

    #[inline]
    pub fn amplified_read(arena: &dyn ReaderArena, virtual_amount: u64) -> Result<()> {
        arena.amplified_read(virtual_amount)
    }

    // ---------------------------------------------------------------------
    // Segment addressing

    /// Address of word `index` of a builder segment.
    unsafe fn builder_word(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        index: WordCount32,
    ) -> *mut u8 {
        let (start, _capacity) = arena.get_segment_mut(segment_id);
        start.offset(index as isize * BYTES_PER_WORD as isize)
    }

    /// Address of word `index` of a reader segment. The address is computed
    /// without a bounds check; the caller checks whatever interval it
    /// actually dereferences.
    fn reader_word(
        arena: &dyn ReaderArena,
        segment_id: u32,
        index: WordCount32,
    ) -> Result<*const u8> {
        let (start, _len) = arena.get_segment(segment_id)?;
        Ok(start.wrapping_offset(index as isize * BYTES_PER_WORD as isize))
    }

    // ---------------------------------------------------------------------
    // Far-pointer resolution

    /// Reader-side far resolution: returns the object's first word, the
    /// pointer carrying its kind and size, and the segment it lives in.
    /// Every hop is bounds-checked.
    #[inline]
    pub unsafe fn follow_fars(
        arena: &dyn ReaderArena,
        reff: *const WirePointer,
        segment_id: u32,
    ) -> Result<(*const u8, *const WirePointer, u32)> {
        if (*reff).kind() != WirePointerKind::Far {
            let target = WirePointer::target_from_segment(reff, arena, segment_id)?;
            return Ok((target, reff, segment_id));
        }

        let pad_segment_id = (*reff).far_segment_id();
        let pad_ptr = reader_word(arena, pad_segment_id, (*reff).far_position_in_segment())?;
        let pad_words: usize = if (*reff).is_double_far() { 2 } else { 1 };
        bounds_check(arena, pad_segment_id, pad_ptr, pad_words)?;
        let pad = pad_ptr as *const WirePointer;

        if !(*reff).is_double_far() {
            let target = WirePointer::target_from_segment(pad, arena, pad_segment_id)?;
            return Ok((target, pad, pad_segment_id));
        }

        // The pad is itself a far pointer naming the object's position;
        // the word after it carries the object's kind and size.
        let object_segment_id = (*pad).far_segment_id();
        let object = reader_word(arena, object_segment_id, (*pad).far_position_in_segment())?;
        Ok((object, pad.offset(1), object_segment_id))
    }

    /// Builder-side far resolution. On return the pointer carries the
    /// object's kind and size, and its kind is never `Far`. Builder data is
    /// well-formed by construction, so no bounds checks apply.
    #[inline]
    pub unsafe fn follow_builder_fars(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        ref_target: *mut u8,
        segment_id: u32,
    ) -> Result<(*mut u8, *mut WirePointer, u32)> {
        if (*reff).kind() != WirePointerKind::Far {
            return Ok((ref_target, reff, segment_id));
        }

        let pad_segment_id = (*reff).far_segment_id();
        let pad =
            builder_word(arena, pad_segment_id, (*reff).far_position_in_segment()) as *mut WirePointer;

        if !(*reff).is_double_far() {
            return Ok((WirePointer::mut_target(pad), pad, pad_segment_id));
        }

        let object_segment_id = (*pad).far_segment_id();
        let object = builder_word(arena, object_segment_id, (*pad).far_position_in_segment());
        Ok((object, pad.offset(1), object_segment_id))
    }

    // ---------------------------------------------------------------------
    // Allocation and zeroing

    /// Allocates space for a new object, zeroing whatever the pointer slot
    /// previously referenced. If the current segment is full, the object
    /// goes to another segment and the slot becomes a far pointer to a
    /// landing pad placed just before the object. Returns the object
    /// address, the pointer that carries the object's kind and size (the
    /// slot itself, or the landing pad), and the object's segment.
    #[inline]
    pub unsafe fn allocate(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        amount: WordCount32,
        kind: WirePointerKind,
    ) -> (*mut u8, *mut WirePointer, u32) {
        if !(*reff).is_null() {
            zero_object(arena, segment_id, reff);
        }

        if amount == 0 && kind == WirePointerKind::Struct {
            (*reff).set_kind_and_target_for_empty_struct();
            return (reff as *mut u8, reff, segment_id);
        }

        if let Some(word_idx) = arena.allocate(segment_id, amount) {
            let object = builder_word(arena, segment_id, word_idx);
            (*reff).set_kind_and_target(kind, object);
            return (object, reff, segment_id);
        }

        // The slot's segment is full. Put the object elsewhere, preceded
        // by a landing pad, and leave a far pointer in the slot.
        let (object_segment_id, pad_idx) =
            arena.allocate_anywhere(amount + POINTER_SIZE_IN_WORDS as u32);
        (*reff).set_far(false, pad_idx);
        (*reff).set_far_segment_id(object_segment_id);

        let pad = builder_word(arena, object_segment_id, pad_idx) as *mut WirePointer;
        let object = (pad as *mut u8).add(BYTES_PER_WORD);
        (*pad).set_kind_and_target(kind, object);
        (object, pad, object_segment_id)
    }

    /// Zeroes the object a pointer references, recursively. Called before a
    /// slot is overwritten, so that the dropped storage neither leaks
    /// stale data onto the wire nor resists packing.
    pub unsafe fn zero_object(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: *mut WirePointer,
    ) {
        match (*reff).kind() {
            WirePointerKind::Struct | WirePointerKind::List => {
                zero_object_body(arena, segment_id, reff, WirePointer::mut_target(reff))
            }
            WirePointerKind::Far => zero_through_far(arena, reff),
            WirePointerKind::Reserved => panic!("don't know how to zero a reserved pointer"),
        }
    }

    unsafe fn zero_through_far(arena: &mut dyn BuilderArena, reff: *mut WirePointer) {
        let pad_segment_id = (*reff).far_segment_id();
        let pad =
            builder_word(arena, pad_segment_id, (*reff).far_position_in_segment()) as *mut WirePointer;

        if (*reff).is_double_far() {
            let object_segment_id = (*pad).far_segment_id();
            let object = builder_word(arena, object_segment_id, (*pad).far_position_in_segment());
            zero_object_body(arena, object_segment_id, pad.offset(1), object);
            ptr::write_bytes(pad as *mut u8, 0, 2 * BYTES_PER_WORD);
        } else {
            zero_object(arena, pad_segment_id, pad);
            ptr::write_bytes(pad as *mut u8, 0, BYTES_PER_WORD);
        }
    }

    unsafe fn zero_object_body(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        tag: *mut WirePointer,
        ptr: *mut u8,
    ) {
        match (*tag).kind() {
            WirePointerKind::Struct => zero_struct_body(arena, segment_id, tag, ptr),
            WirePointerKind::List => zero_list_body(arena, segment_id, tag, ptr),
            WirePointerKind::Far | WirePointerKind::Reserved => {
                panic!("object tag has a non-object kind")
            }
        }
    }

    unsafe fn zero_struct_body(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        tag: *mut WirePointer,
        ptr: *mut u8,
    ) {
        let data_words = (*tag).struct_data_size() as usize;
        let pointer_section = ptr.add(data_words * BYTES_PER_WORD) as *mut WirePointer;
        for i in 0..(*tag).struct_ptr_count() as usize {
            zero_object(arena, segment_id, pointer_section.add(i));
        }
        ptr::write_bytes(ptr, 0, (*tag).struct_word_size() as usize * BYTES_PER_WORD);
    }

    unsafe fn zero_list_body(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        tag: *mut WirePointer,
        ptr: *mut u8,
    ) {
        let count = (*tag).list_element_count() as usize;
        match (*tag).list_element_size() {
            Void => {}
            Bit | Byte | TwoBytes | FourBytes | EightBytes => {
                let bits =
                    count as u64 * u64::from(data_bits_per_element((*tag).list_element_size()));
                ptr::write_bytes(ptr, 0, round_bits_up_to_words(bits) as usize * BYTES_PER_WORD);
            }
            Pointer => {
                for i in 0..count {
                    zero_object(arena, segment_id, ptr.add(i * BYTES_PER_WORD) as *mut _);
                }
                ptr::write_bytes(ptr, 0, count * BYTES_PER_WORD);
            }
            InlineComposite => {
                let element_tag = ptr as *mut WirePointer;
                assert!(
                    (*element_tag).kind() == WirePointerKind::Struct,
                    "don't know how to zero a non-struct inline composite"
                );

                let data_words = (*element_tag).struct_data_size() as usize;
                let pointer_count = (*element_tag).struct_ptr_count() as usize;
                let step = (*element_tag).struct_word_size() as usize;
                let count = (*element_tag).inline_composite_list_element_count() as usize;

                if pointer_count > 0 {
                    for i in 0..count {
                        let element_pointers = ptr
                            .add(BYTES_PER_WORD * (1 + i * step + data_words))
                            as *mut WirePointer;
                        for j in 0..pointer_count {
                            zero_object(arena, segment_id, element_pointers.add(j));
                        }
                    }
                }
                ptr::write_bytes(ptr, 0, (step * count + 1) * BYTES_PER_WORD);
            }
        }
    }

    /// Zeroes a pointer slot and its landing pads without touching the
    /// object body. Used by the upgrade paths, which transplant the body
    /// themselves.
    #[inline]
    pub unsafe fn zero_pointer_and_fars(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
    ) -> Result<()> {
        if (*reff).kind() == WirePointerKind::Far {
            let pad = builder_word(arena, (*reff).far_segment_id(), (*reff).far_position_in_segment());
            let pad_words = if (*reff).is_double_far() { 2 } else { 1 };
            ptr::write_bytes(pad, 0, pad_words * BYTES_PER_WORD);
        }
        ptr::write_bytes(reff as *mut u8, 0, BYTES_PER_WORD);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Sizing

    /// Counts the words reachable from a pointer. Used to size copies.
    pub unsafe fn total_size(
        arena: &dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        nesting_limit: i32,
    ) -> Result<MessageSize> {
        if (*reff).is_null() {
            return Ok(MessageSize::default());
        }

        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;

        match (*reff).kind() {
            WirePointerKind::Struct => {
                struct_content_size(arena, segment_id, reff, ptr, nesting_limit - 1)
            }
            WirePointerKind::List => {
                list_content_size(arena, segment_id, reff, ptr, nesting_limit - 1)
            }
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::UnexpectedFarPointer)),
            WirePointerKind::Reserved => Err(Error::from_kind(ErrorKind::UnknownPointerKind)),
        }
    }

    unsafe fn struct_content_size(
        arena: &dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        ptr: *const u8,
        nesting_limit: i32,
    ) -> Result<MessageSize> {
        bounds_check(arena, segment_id, ptr, (*reff).struct_word_size() as usize)?;

        let mut result = MessageSize {
            word_count: u64::from((*reff).struct_word_size()),
        };
        let pointer_section =
            ptr.add((*reff).struct_data_size() as usize * BYTES_PER_WORD) as *const WirePointer;
        for i in 0..(*reff).struct_ptr_count() as usize {
            result += total_size(arena, segment_id, pointer_section.add(i), nesting_limit)?;
        }
        Ok(result)
    }

    unsafe fn list_content_size(
        arena: &dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        ptr: *const u8,
        nesting_limit: i32,
    ) -> Result<MessageSize> {
        let element_size = (*reff).list_element_size();
        let count = (*reff).list_element_count();

        match element_size {
            Void => Ok(MessageSize::default()),
            Bit | Byte | TwoBytes | FourBytes | EightBytes => {
                let words = round_bits_up_to_words(
                    u64::from(count) * u64::from(data_bits_per_element(element_size)),
                );
                bounds_check(arena, segment_id, ptr, words as usize)?;
                Ok(MessageSize {
                    word_count: u64::from(words),
                })
            }
            Pointer => {
                bounds_check(arena, segment_id, ptr, count as usize * WORDS_PER_POINTER)?;

                let mut result = MessageSize {
                    word_count: u64::from(count) * WORDS_PER_POINTER as u64,
                };
                for i in 0..count as usize {
                    result += total_size(
                        arena,
                        segment_id,
                        (ptr as *const WirePointer).add(i),
                        nesting_limit,
                    )?;
                }
                Ok(result)
            }
            InlineComposite => {
                let declared_words = (*reff).list_inline_composite_word_count();
                bounds_check(
                    arena,
                    segment_id,
                    ptr,
                    declared_words as usize + POINTER_SIZE_IN_WORDS,
                )?;

                let tag = ptr as *const WirePointer;
                let (element_count, step_bits, data_bits, pointer_count) = composite_shape(tag)?;
                let step_words = u64::from(step_bits) / BITS_PER_WORD as u64;

                let actual_words = step_words * u64::from(element_count);
                if actual_words > u64::from(declared_words) {
                    return Err(Error::from_kind(ErrorKind::InlineCompositeOverrun));
                }

                // Count the actual size rather than the declared word
                // count, because the actual size is what a copy ends up
                // with.
                let mut result = MessageSize {
                    word_count: actual_words + POINTER_SIZE_IN_WORDS as u64,
                };

                if pointer_count > 0 {
                    let data_words = data_bits as usize / BITS_PER_WORD;
                    for i in 0..element_count as usize {
                        let element_pointers = ptr.add(
                            BYTES_PER_WORD * (1 + i * step_words as usize + data_words),
                        ) as *const WirePointer;
                        for j in 0..pointer_count as usize {
                            result += total_size(
                                arena,
                                segment_id,
                                element_pointers.add(j),
                                nesting_limit,
                            )?;
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Trusted copies of default-value blobs

    // Helper for copy_message().
    unsafe fn copy_struct(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        dst: *mut u8,
        src: *const u8,
        data_words: usize,
        pointer_count: usize,
    ) {
        ptr::copy_nonoverlapping(src, dst, data_words * BYTES_PER_WORD);

        let src_pointers = (src as *const WirePointer).add(data_words);
        let dst_pointers = (dst as *mut WirePointer).add(data_words);
        for i in 0..pointer_count {
            copy_message(arena, segment_id, dst_pointers.add(i), src_pointers.add(i));
        }
    }

    /// Copies a trusted, flat message fragment (a schema default blob) into
    /// a builder. Returns (object pointer, size-bearing pointer, segment).
    pub unsafe fn copy_message(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        dst: *mut WirePointer,
        src: *const WirePointer,
    ) -> (*mut u8, *mut WirePointer, u32) {
        if (*src).is_null() {
            ptr::write_bytes(dst as *mut u8, 0, BYTES_PER_WORD);
            return (ptr::null_mut(), dst, segment_id);
        }

        match (*src).kind() {
            WirePointerKind::Struct => {
                let src_ptr = WirePointer::target(src);
                let (dst_ptr, dst, segment_id) = allocate(
                    arena,
                    dst,
                    segment_id,
                    (*src).struct_word_size(),
                    WirePointerKind::Struct,
                );
                copy_struct(
                    arena,
                    segment_id,
                    dst_ptr,
                    src_ptr,
                    (*src).struct_data_size() as usize,
                    (*src).struct_ptr_count() as usize,
                );
                (*dst).set_struct_size_from_pieces(
                    (*src).struct_data_size(),
                    (*src).struct_ptr_count(),
                );
                (dst_ptr, dst, segment_id)
            }
            WirePointerKind::List => copy_list_message(arena, segment_id, dst, src),
            WirePointerKind::Far => panic!("default value blob contained a far pointer"),
            WirePointerKind::Reserved => {
                panic!("default value blob contained a reserved pointer")
            }
        }
    }

    unsafe fn copy_list_message(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        dst: *mut WirePointer,
        src: *const WirePointer,
    ) -> (*mut u8, *mut WirePointer, u32) {
        let element_size = (*src).list_element_size();
        let element_count = (*src).list_element_count();
        let src_ptr = WirePointer::target(src);

        match element_size {
            Void | Bit | Byte | TwoBytes | FourBytes | EightBytes => {
                let word_count = round_bits_up_to_words(
                    u64::from(element_count) * u64::from(data_bits_per_element(element_size)),
                );
                let (dst_ptr, dst, segment_id) =
                    allocate(arena, dst, segment_id, word_count, WirePointerKind::List);
                ptr::copy_nonoverlapping(src_ptr, dst_ptr, word_count as usize * BYTES_PER_WORD);
                (*dst).set_list_size_and_count(element_size, element_count);
                (dst_ptr, dst, segment_id)
            }
            Pointer => {
                let (dst_ptr, dst, segment_id) =
                    allocate(arena, dst, segment_id, element_count, WirePointerKind::List);
                for i in 0..element_count as usize {
                    copy_message(
                        arena,
                        segment_id,
                        (dst_ptr as *mut WirePointer).add(i),
                        (src_ptr as *const WirePointer).add(i),
                    );
                }
                (*dst).set_list_size_and_count(Pointer, element_count);
                (dst_ptr, dst, segment_id)
            }
            InlineComposite => {
                let declared_words = (*src).list_inline_composite_word_count();
                let (dst_ptr, dst, segment_id) = allocate(
                    arena,
                    dst,
                    segment_id,
                    declared_words + 1,
                    WirePointerKind::List,
                );
                (*dst).set_list_inline_composite(declared_words);

                let src_tag = src_ptr as *const WirePointer;
                assert!(
                    (*src_tag).kind() == WirePointerKind::Struct,
                    "unsupported inline composite list"
                );
                ptr::copy_nonoverlapping(src_tag, dst_ptr as *mut WirePointer, 1);

                let data_words = (*src_tag).struct_data_size() as usize;
                let pointer_count = (*src_tag).struct_ptr_count() as usize;
                let step_bytes = (*src_tag).struct_word_size() as usize * BYTES_PER_WORD;
                for i in 0..(*src_tag).inline_composite_list_element_count() as usize {
                    copy_struct(
                        arena,
                        segment_id,
                        dst_ptr.add(BYTES_PER_WORD + i * step_bytes),
                        src_ptr.add(BYTES_PER_WORD + i * step_bytes),
                        data_words,
                        pointer_count,
                    );
                }
                (dst_ptr, dst, segment_id)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Pointer transfer

    /// Makes `*dst` reference the same object as `*src`; the two slots may
    /// be in different segments. The caller must zero the source slot
    /// afterwards (callers typically transfer a whole pointer section and
    /// then zero it in one pass).
    pub unsafe fn transfer_pointer(
        arena: &mut dyn BuilderArena,
        dst_segment_id: u32,
        dst: *mut WirePointer,
        src_segment_id: u32,
        src: *mut WirePointer,
    ) {
        assert!((*dst).is_null());

        if (*src).is_null() {
            ptr::write_bytes(dst as *mut u8, 0, BYTES_PER_WORD);
            return;
        }
        if !(*src).is_positional() {
            // Far pointers are position-independent.
            ptr::copy_nonoverlapping(src, dst, 1);
            return;
        }

        let src_ptr = WirePointer::mut_target(src);

        if dst_segment_id == src_segment_id {
            // Same segment: a direct pointer suffices.
            if (*src).kind() == WirePointerKind::Struct && (*src).struct_word_size() == 0 {
                (*dst).set_kind_and_target_for_empty_struct();
            } else {
                (*dst).set_kind_and_target((*src).kind(), src_ptr);
            }
            copy_size_half(src, dst);
            return;
        }

        // A far pointer is needed. A pad in the object's own segment keeps
        // it a single-far; if that segment is full, fall back to a
        // two-word double-far pad anywhere.
        match arena.allocate(src_segment_id, 1) {
            Some(pad_idx) => {
                let pad = builder_word(arena, src_segment_id, pad_idx) as *mut WirePointer;
                (*pad).set_kind_and_target((*src).kind(), src_ptr);
                copy_size_half(src, pad);

                (*dst).set_far(false, pad_idx);
                (*dst).set_far_segment_id(src_segment_id);
            }
            None => {
                let (pad_segment_id, pad_idx) = arena.allocate_anywhere(2);
                let pad = builder_word(arena, pad_segment_id, pad_idx) as *mut WirePointer;

                let (src_seg_start, _capacity) = arena.get_segment_mut(src_segment_id);
                let src_word_idx =
                    ((src_ptr as usize - src_seg_start as usize) / BYTES_PER_WORD) as u32;
                (*pad).set_far(false, src_word_idx);
                (*pad).set_far_segment_id(src_segment_id);

                let tag = pad.offset(1);
                (*tag).set_kind_with_zero_offset((*src).kind());
                copy_size_half(src, tag);

                (*dst).set_far(true, pad_idx);
                (*dst).set_far_segment_id(pad_segment_id);
            }
        }
    }

    /// Copies the size-bearing upper half of a pointer word. Done with a
    /// memcpy to stay within the aliasing rules.
    unsafe fn copy_size_half(src: *const WirePointer, dst: *mut WirePointer) {
        ptr::copy_nonoverlapping(&(*src).upper32bits, &mut (*dst).upper32bits, 1);
    }

    // ---------------------------------------------------------------------
    // Struct write

    #[inline]
    pub unsafe fn init_struct_pointer(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        size: StructSize,
    ) -> StructBuilder<'_> {
        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            size.total(),
            WirePointerKind::Struct,
        );
        (*reff).set_struct_size(size);

        StructBuilder {
            arena,
            segment_id,
            data: ptr,
            pointers: ptr.offset(size.data as isize * BYTES_PER_WORD as isize) as *mut _,
            data_size: u32::from(size.data) * BITS_PER_WORD as BitCount32,
            pointer_count: size.pointers,
            bit0_offset: 0,
        }
    }

    #[inline]
    pub unsafe fn get_writable_struct_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        mut reff: *mut WirePointer,
        mut segment_id: u32,
        size: StructSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<StructBuilder<'a>> {
        let mut ref_target = WirePointer::mut_target(reff);

        if (*reff).is_null() {
            match default {
                Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                    let (new_ref_target, new_reff, new_segment_id) =
                        copy_message(arena, segment_id, reff, d.as_ptr() as *const WirePointer);
                    reff = new_reff;
                    segment_id = new_segment_id;
                    ref_target = new_ref_target;
                }
                _ => return Ok(init_struct_pointer(arena, reff, segment_id, size)),
            }
        }

        let (old_ptr, old_ref, old_segment_id) =
            follow_builder_fars(arena, reff, ref_target, segment_id)?;
        if (*old_ref).kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(ErrorKind::ExpectedStructPointer));
        }

        let old_data_size = (*old_ref).struct_data_size();
        let old_pointer_count = (*old_ref).struct_ptr_count();
        let old_pointer_section =
            old_ptr.add(old_data_size as usize * BYTES_PER_WORD) as *mut WirePointer;

        if old_data_size >= size.data && old_pointer_count >= size.pointers {
            // The existing allocation is big enough; hand it back as-is.
            return Ok(StructBuilder {
                arena,
                segment_id: old_segment_id,
                data: old_ptr,
                pointers: old_pointer_section,
                data_size: u32::from(old_data_size) * BITS_PER_WORD as u32,
                pointer_count: old_pointer_count,
                bit0_offset: 0,
            });
        }

        // The value was written by an older, smaller schema. Readers could
        // simply bounds check at access time, but a builder has to handle
        // writes, so the struct is copied into a bigger allocation now.

        let new_data_size = old_data_size.max(size.data);
        let new_pointer_count = old_pointer_count.max(size.pointers);
        let total_size =
            u32::from(new_data_size) + u32::from(new_pointer_count) * WORDS_PER_POINTER as u32;

        // Don't let allocate() zero the object yet; its body is about to
        // be transplanted.
        zero_pointer_and_fars(arena, reff)?;

        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, total_size, WirePointerKind::Struct);
        (*reff).set_struct_size_from_pieces(new_data_size, new_pointer_count);

        ptr::copy_nonoverlapping(old_ptr, ptr, old_data_size as usize * BYTES_PER_WORD);

        let new_pointer_section = ptr.add(new_data_size as usize * BYTES_PER_WORD) as *mut WirePointer;
        for i in 0..old_pointer_count as usize {
            transfer_pointer(
                arena,
                segment_id,
                new_pointer_section.add(i),
                old_segment_id,
                old_pointer_section.add(i),
            );
        }

        // Zero the old body: stale contents must not leak onto the wire,
        // and zeroed words pack away to almost nothing.
        ptr::write_bytes(
            old_ptr,
            0,
            (old_data_size as usize + old_pointer_count as usize) * BYTES_PER_WORD,
        );

        Ok(StructBuilder {
            arena,
            segment_id,
            data: ptr,
            pointers: new_pointer_section,
            data_size: u32::from(new_data_size) * BITS_PER_WORD as u32,
            pointer_count: new_pointer_count,
            bit0_offset: 0,
        })
    }

    // ---------------------------------------------------------------------
    // List write

    #[inline]
    pub unsafe fn init_list_pointer(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        element_count: ElementCount32,
        element_size: ElementSize,
    ) -> ListBuilder<'_> {
        assert!(
            element_size != InlineComposite,
            "should have called init_struct_list_pointer() instead"
        );

        let data_size = data_bits_per_element(element_size);
        let pointer_count = pointers_per_element(element_size);
        let step = data_size + pointer_count * BITS_PER_POINTER as u32;
        let word_count = round_bits_up_to_words(u64::from(element_count) * u64::from(step));
        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, word_count, WirePointerKind::List);

        (*reff).set_list_size_and_count(element_size, element_count);

        ListBuilder {
            arena,
            segment_id,
            ptr,
            step,
            element_count,
            element_size,
            struct_data_size: data_size,
            struct_pointer_count: pointer_count as u16,
        }
    }

    #[inline]
    pub unsafe fn init_struct_list_pointer(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> ListBuilder<'_> {
        if element_size.preferred_list_encoding != InlineComposite {
            // Small data-only struct: a flat primitive list holds it.
            return init_list_pointer(
                arena,
                reff,
                segment_id,
                element_count,
                element_size.preferred_list_encoding,
            );
        }

        let words_per_element = element_size.total();

        // The list is prefixed by a tag word describing the elements.
        let word_count: WordCount32 = element_count * words_per_element;
        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            POINTER_SIZE_IN_WORDS as u32 + word_count,
            WirePointerKind::List,
        );
        let tag = ptr as *mut WirePointer;

        (*reff).set_list_inline_composite(word_count);
        (*tag).set_kind_and_inline_composite_list_element_count(
            WirePointerKind::Struct,
            element_count,
        );
        (*tag).set_struct_size(element_size);

        ListBuilder {
            arena,
            segment_id,
            ptr: ptr.add(BYTES_PER_WORD),
            step: words_per_element * BITS_PER_WORD as u32,
            element_count,
            element_size: InlineComposite,
            struct_data_size: u32::from(element_size.data) * (BITS_PER_WORD as u32),
            struct_pointer_count: element_size.pointers,
        }
    }

    #[inline]
    pub unsafe fn get_writable_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        mut orig_ref: *mut WirePointer,
        mut orig_segment_id: u32,
        element_size: ElementSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<ListBuilder<'a>> {
        assert!(
            element_size != InlineComposite,
            "use get_writable_struct_list_pointer() for struct lists"
        );

        let mut orig_ref_target = WirePointer::mut_target(orig_ref);

        if (*orig_ref).is_null() {
            match default {
                Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                    let (new_target, new_ref, new_segment_id) = copy_message(
                        arena,
                        orig_segment_id,
                        orig_ref,
                        d.as_ptr() as *const WirePointer,
                    );
                    orig_ref_target = new_target;
                    orig_ref = new_ref;
                    orig_segment_id = new_segment_id;
                }
                _ => return Ok(ListBuilder::new_default(arena)),
            }
        }

        // The existing list must be verified against the expected element
        // size, but never upgraded: there is no upgrade path *to* a
        // non-struct list, only *from* one.

        let (mut ptr, reff, segment_id) =
            follow_builder_fars(arena, orig_ref, orig_ref_target, orig_segment_id)?;

        if (*reff).kind() != WirePointerKind::List {
            return Err(Error::from_kind(ErrorKind::ExpectedListPointer));
        }

        let old_size = (*reff).list_element_size();

        if old_size == InlineComposite {
            // An inline-composite element is at least one word, so this
            // data was written by a newer schema. Validate the view.
            let tag = ptr as *const WirePointer;
            let (element_count, step_bits, data_bits, pointer_count) = composite_shape(tag)?;
            ptr = ptr.add(BYTES_PER_WORD);

            match element_size {
                Void => {} // Anything is a valid upgrade from Void.
                Bit => {
                    return Err(Error::from_kind(ErrorKind::ExpectedBitList));
                }
                Byte | TwoBytes | FourBytes | EightBytes => {
                    if data_bits == 0 {
                        return Err(Error::from_kind(ErrorKind::IncompatibleListElement));
                    }
                }
                Pointer => {
                    if pointer_count == 0 {
                        return Err(Error::from_kind(ErrorKind::IncompatibleListElement));
                    }
                    // Serve reads out of the elements' pointer sections.
                    ptr = ptr.add(data_bits as usize / BITS_PER_BYTE);
                }
                InlineComposite => unreachable!(),
            }

            Ok(ListBuilder {
                arena,
                segment_id,
                ptr,
                element_count,
                element_size: InlineComposite,
                step: step_bits,
                struct_data_size: data_bits,
                struct_pointer_count: pointer_count,
            })
        } else {
            let data_size = data_bits_per_element(old_size);
            let pointer_count = pointers_per_element(old_size);

            if data_size < data_bits_per_element(element_size)
                || pointer_count < pointers_per_element(element_size)
            {
                return Err(Error::from_kind(ErrorKind::IncompatibleListElement));
            }

            Ok(ListBuilder {
                arena,
                segment_id,
                ptr,
                step: data_size + pointer_count * BITS_PER_POINTER as u32,
                element_count: (*reff).list_element_count(),
                element_size: old_size,
                struct_data_size: data_size,
                struct_pointer_count: pointer_count as u16,
            })
        }
    }

    pub unsafe fn get_writable_struct_list_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        mut orig_ref: *mut WirePointer,
        mut orig_segment_id: u32,
        element_size: StructSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<ListBuilder<'a>> {
        let mut orig_ref_target = WirePointer::mut_target(orig_ref);

        if (*orig_ref).is_null() {
            match default {
                Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                    let (new_target, new_ref, new_segment_id) = copy_message(
                        arena,
                        orig_segment_id,
                        orig_ref,
                        d.as_ptr() as *const WirePointer,
                    );
                    orig_ref_target = new_target;
                    orig_ref = new_ref;
                    orig_segment_id = new_segment_id;
                }
                _ => return Ok(ListBuilder::new_default(arena)),
            }
        }

        // The existing list must be verified against the expected element
        // shape and possibly upgraded in place.

        let (old_ptr, old_ref, old_segment_id) =
            follow_builder_fars(arena, orig_ref, orig_ref_target, orig_segment_id)?;

        if (*old_ref).kind() != WirePointerKind::List {
            return Err(Error::from_kind(ErrorKind::ExpectedListPointer));
        }

        let old_size = (*old_ref).list_element_size();
        if old_size == InlineComposite {
            upgrade_composite_list(
                arena,
                orig_ref,
                orig_segment_id,
                old_ptr,
                old_segment_id,
                element_size,
            )
        } else {
            upgrade_noncomposite_list(
                arena,
                orig_ref,
                orig_segment_id,
                old_ref,
                old_ptr,
                old_segment_id,
                old_size,
                element_size,
            )
        }
    }

    /// The existing list already has the tagged encoding; reuse it if the
    /// elements are big enough, otherwise expand every element.
    unsafe fn upgrade_composite_list<'a>(
        arena: &'a mut dyn BuilderArena,
        orig_ref: *mut WirePointer,
        orig_segment_id: u32,
        old_ptr: *mut u8,
        old_segment_id: u32,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        let old_tag = old_ptr as *const WirePointer;
        let (element_count, old_step_bits, old_data_bits, old_pointer_count) =
            composite_shape(old_tag)?;
        let elements = old_ptr.add(BYTES_PER_WORD);

        let old_data_words = (old_data_bits as usize / BITS_PER_WORD) as u16;
        if old_data_words >= element_size.data && old_pointer_count >= element_size.pointers {
            // Old size is at least as large as needed. Ship it.
            return Ok(ListBuilder {
                arena,
                segment_id: old_segment_id,
                ptr: elements,
                element_count,
                element_size: InlineComposite,
                step: old_step_bits,
                struct_data_size: old_data_bits,
                struct_pointer_count: old_pointer_count,
            });
        }

        // The structs in this list were written by an older schema. Copy
        // into an expanded list.

        let new_data_words = old_data_words.max(element_size.data);
        let new_pointer_count = old_pointer_count.max(element_size.pointers);
        let new_step_words =
            u32::from(new_data_words) + u32::from(new_pointer_count) * WORDS_PER_POINTER as u32;
        let body_words = new_step_words * element_count;

        // Don't let allocate() zero the old list; its elements are about
        // to be transplanted.
        zero_pointer_and_fars(arena, orig_ref)?;

        let (new_ptr, new_ref, new_segment_id) = allocate(
            arena,
            orig_ref,
            orig_segment_id,
            body_words + POINTER_SIZE_IN_WORDS as u32,
            WirePointerKind::List,
        );
        (*new_ref).set_list_inline_composite(body_words);

        let new_tag = new_ptr as *mut WirePointer;
        (*new_tag)
            .set_kind_and_inline_composite_list_element_count(WirePointerKind::Struct, element_count);
        (*new_tag).set_struct_size_from_pieces(new_data_words, new_pointer_count);
        let new_elements = new_ptr.add(BYTES_PER_WORD);

        let old_step_bytes = old_step_bits as usize / BITS_PER_BYTE;
        let new_step_bytes = new_step_words as usize * BYTES_PER_WORD;
        for i in 0..element_count as usize {
            let src = elements.add(i * old_step_bytes);
            let dst = new_elements.add(i * new_step_bytes);
            ptr::copy_nonoverlapping(src, dst, old_data_words as usize * BYTES_PER_WORD);

            let src_pointers =
                src.add(old_data_words as usize * BYTES_PER_WORD) as *mut WirePointer;
            let dst_pointers =
                dst.add(new_data_words as usize * BYTES_PER_WORD) as *mut WirePointer;
            for j in 0..old_pointer_count as usize {
                transfer_pointer(
                    arena,
                    new_segment_id,
                    dst_pointers.add(j),
                    old_segment_id,
                    src_pointers.add(j),
                );
            }
        }

        // Zero the old list, tag word included.
        ptr::write_bytes(
            old_ptr,
            0,
            (element_count as usize * old_step_bytes) + BYTES_PER_WORD,
        );

        Ok(ListBuilder {
            arena,
            segment_id: new_segment_id,
            ptr: new_elements,
            element_count,
            element_size: InlineComposite,
            step: new_step_words * BITS_PER_WORD as u32,
            struct_data_size: u32::from(new_data_words) * BITS_PER_WORD as u32,
            struct_pointer_count: new_pointer_count,
        })
    }

    /// The existing list has a flat encoding; view it in place when its
    /// elements are large enough for the preferred encoding, or widen it.
    #[allow(clippy::too_many_arguments)]
    unsafe fn upgrade_noncomposite_list<'a>(
        arena: &'a mut dyn BuilderArena,
        orig_ref: *mut WirePointer,
        orig_segment_id: u32,
        old_ref: *mut WirePointer,
        old_ptr: *mut u8,
        old_segment_id: u32,
        old_size: ElementSize,
        element_size: StructSize,
    ) -> Result<ListBuilder<'a>> {
        let preferred = element_size.preferred_list_encoding;
        let old_data_bits = data_bits_per_element(old_size);
        let old_pointer_count = pointers_per_element(old_size);
        let old_step_bits = old_data_bits + old_pointer_count * BITS_PER_POINTER as u32;
        let element_count = (*old_ref).list_element_count();

        // Verify that the old encoding is in the right class for the
        // preferred one.
        let compatible = match preferred {
            Void | InlineComposite => true,
            Pointer => old_size == Pointer || old_size == Void,
            Bit | Byte | TwoBytes | FourBytes | EightBytes => old_size != Pointer,
        };
        if !compatible {
            return Err(Error::from_kind(ErrorKind::IncompatibleListElement));
        }

        if old_size >= preferred {
            // The old elements are at least as large as the preferred
            // encoding (including an exact match); no upgrade is needed.
            return Ok(ListBuilder {
                arena,
                segment_id: old_segment_id,
                ptr: old_ptr,
                step: old_step_bits,
                element_count,
                element_size: old_size,
                struct_data_size: old_data_bits,
                struct_pointer_count: old_pointer_count as u16,
            });
        }

        if old_size == Void {
            // Nothing to copy; allocate fresh.
            return Ok(init_struct_list_pointer(
                arena,
                orig_ref,
                orig_segment_id,
                element_count,
                element_size,
            ));
        }

        if preferred == InlineComposite {
            // Upgrade to an inline-composite list.
            let mut new_data_words = element_size.data;
            let mut new_pointer_count = element_size.pointers;

            if old_size == Pointer {
                new_pointer_count = new_pointer_count.max(1);
            } else {
                // The old list holds data elements, so at least one data
                // word is needed to receive them.
                new_data_words = new_data_words.max(1);
            }

            let new_step_words =
                u32::from(new_data_words) + u32::from(new_pointer_count) * WORDS_PER_POINTER as u32;
            let body_words = element_count * new_step_words;

            zero_pointer_and_fars(arena, orig_ref)?;

            let (new_ptr, new_ref, new_segment_id) = allocate(
                arena,
                orig_ref,
                orig_segment_id,
                body_words + POINTER_SIZE_IN_WORDS as u32,
                WirePointerKind::List,
            );
            (*new_ref).set_list_inline_composite(body_words);

            let tag = new_ptr as *mut WirePointer;
            (*tag).set_kind_and_inline_composite_list_element_count(
                WirePointerKind::Struct,
                element_count,
            );
            (*tag).set_struct_size_from_pieces(new_data_words, new_pointer_count);
            let new_elements = new_ptr.add(BYTES_PER_WORD);

            let new_step_bytes = new_step_words as usize * BYTES_PER_WORD;
            if old_size == Pointer {
                let data_bytes = new_data_words as usize * BYTES_PER_WORD;
                for i in 0..element_count as usize {
                    transfer_pointer(
                        arena,
                        new_segment_id,
                        new_elements.add(i * new_step_bytes + data_bytes) as *mut WirePointer,
                        old_segment_id,
                        (old_ptr as *mut WirePointer).add(i),
                    );
                }
            } else {
                widen_data_elements(
                    old_ptr,
                    old_size,
                    old_data_bits,
                    new_elements,
                    new_step_bytes,
                    element_count,
                );
            }

            ptr::write_bytes(
                old_ptr,
                0,
                round_bits_up_to_bytes(u64::from(old_step_bits) * u64::from(element_count))
                    as usize,
            );

            Ok(ListBuilder {
                arena,
                segment_id: new_segment_id,
                ptr: new_elements,
                element_count,
                element_size: InlineComposite,
                step: new_step_words * BITS_PER_WORD as u32,
                struct_data_size: u32::from(new_data_words) * BITS_PER_WORD as u32,
                struct_pointer_count: new_pointer_count,
            })
        } else {
            // Both the old and preferred encodings are data-only, so this
            // is a widening from one primitive size to another.
            let new_data_bits = data_bits_per_element(preferred);
            let total_words =
                round_bits_up_to_words(u64::from(new_data_bits) * u64::from(element_count));

            zero_pointer_and_fars(arena, orig_ref)?;

            let (new_ptr, new_ref, new_segment_id) = allocate(
                arena,
                orig_ref,
                orig_segment_id,
                total_words,
                WirePointerKind::List,
            );
            (*new_ref).set_list_size_and_count(preferred, element_count);

            widen_data_elements(
                old_ptr,
                old_size,
                old_data_bits,
                new_ptr,
                new_data_bits as usize / BITS_PER_BYTE,
                element_count,
            );

            ptr::write_bytes(
                old_ptr,
                0,
                round_bits_up_to_bytes(u64::from(old_step_bits) * u64::from(element_count))
                    as usize,
            );

            Ok(ListBuilder {
                arena,
                segment_id: new_segment_id,
                ptr: new_ptr,
                step: new_data_bits,
                element_count,
                element_size: preferred,
                struct_data_size: new_data_bits,
                struct_pointer_count: 0,
            })
        }
    }

    /// Copies data-only elements into wider slots, one element per
    /// `dst_stride` bytes. Bit-sized sources widen bit by bit.
    unsafe fn widen_data_elements(
        old_ptr: *const u8,
        old_size: ElementSize,
        old_data_bits: BitCount32,
        dst: *mut u8,
        dst_stride: usize,
        element_count: ElementCount32,
    ) {
        if old_size == Bit {
            for i in 0..element_count as usize {
                *dst.add(i * dst_stride) = (*old_ptr.add(i / 8) >> (i % 8)) & 1;
            }
        } else {
            let old_bytes = old_data_bits as usize / BITS_PER_BYTE;
            for i in 0..element_count as usize {
                ptr::copy_nonoverlapping(old_ptr.add(i * old_bytes), dst.add(i * dst_stride), old_bytes);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Text and data write

    #[inline]
    pub unsafe fn init_text_pointer(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        size: ByteCount32,
    ) -> text::Builder<'_> {
        // The byte list includes a NUL terminator.
        let byte_size = size + 1;

        let (ptr, reff, _segment_id) = allocate(
            arena,
            reff,
            segment_id,
            round_bytes_up_to_words(byte_size),
            WirePointerKind::List,
        );

        (*reff).set_list_size_and_count(Byte, byte_size);

        text::Builder::new(slice::from_raw_parts_mut(ptr, size as usize))
    }

    #[inline]
    pub unsafe fn set_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        value: text::Reader<'_>,
    ) -> text::Builder<'a> {
        let value_bytes = value.as_bytes();
        let mut builder = init_text_pointer(arena, reff, segment_id, value_bytes.len() as u32);
        builder.reborrow().as_bytes_mut().copy_from_slice(value_bytes);
        builder
    }

    #[inline]
    pub unsafe fn get_writable_text_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        default: Option<&[u8]>,
    ) -> Result<text::Builder<'a>> {
        if (*reff).is_null() {
            return match default {
                None => Ok(text::Builder::new(&mut [])),
                Some(d) => {
                    let mut builder = init_text_pointer(arena, reff, segment_id, d.len() as u32);
                    builder.reborrow().as_bytes_mut().copy_from_slice(d);
                    Ok(builder)
                }
            };
        }

        let ref_target = WirePointer::mut_target(reff);
        let (ptr, reff, _segment_id) = follow_builder_fars(arena, reff, ref_target, segment_id)?;

        if (*reff).kind() != WirePointerKind::List || (*reff).list_element_size() != Byte {
            return Err(Error::from_kind(ErrorKind::ExpectedTextList));
        }

        let count = (*reff).list_element_count();
        if count == 0 || *ptr.add(count as usize - 1) != 0 {
            return Err(Error::from_kind(ErrorKind::TextMissingNulTerminator));
        }

        // Drop the NUL terminator from the builder's view.
        Ok(text::Builder::with_pos(
            slice::from_raw_parts_mut(ptr, (count - 1) as usize),
            (count - 1) as usize,
        ))
    }

    #[inline]
    pub unsafe fn init_data_pointer(
        arena: &mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        size: ByteCount32,
    ) -> data::Builder<'_> {
        let (ptr, reff, _segment_id) = allocate(
            arena,
            reff,
            segment_id,
            round_bytes_up_to_words(size),
            WirePointerKind::List,
        );

        (*reff).set_list_size_and_count(Byte, size);

        data::builder_from_raw_parts(ptr, size)
    }

    #[inline]
    pub unsafe fn set_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        value: &[u8],
    ) -> data::Builder<'a> {
        let builder = init_data_pointer(arena, reff, segment_id, value.len() as u32);
        builder.copy_from_slice(value);
        builder
    }

    #[inline]
    pub unsafe fn get_writable_data_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        reff: *mut WirePointer,
        segment_id: u32,
        default: Option<&[u8]>,
    ) -> Result<data::Builder<'a>> {
        if (*reff).is_null() {
            return match default {
                None => Ok(&mut []),
                Some(d) => {
                    let builder = init_data_pointer(arena, reff, segment_id, d.len() as u32);
                    builder.copy_from_slice(d);
                    Ok(builder)
                }
            };
        }

        let ref_target = WirePointer::mut_target(reff);
        let (ptr, reff, _segment_id) = follow_builder_fars(arena, reff, ref_target, segment_id)?;

        if (*reff).kind() != WirePointerKind::List || (*reff).list_element_size() != Byte {
            return Err(Error::from_kind(ErrorKind::ExpectedDataList));
        }

        Ok(data::builder_from_raw_parts(ptr, (*reff).list_element_count()))
    }

    // ---------------------------------------------------------------------
    // Deep copies between messages

    /// Deep-copies a struct value into a pointer slot.
    pub unsafe fn set_struct_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: *mut WirePointer,
        value: StructReader,
    ) -> Result<()> {
        let data_bytes: ByteCount32 = round_bits_up_to_bytes(u64::from(value.data_size));
        let data_words = round_bytes_up_to_words(data_bytes);
        let ptr_count = value.pointer_count;
        let total_size: WordCount32 = data_words + u32::from(ptr_count) * WORDS_PER_POINTER as u32;

        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, total_size, WirePointerKind::Struct);
        (*reff).set_struct_size_from_pieces(data_words as u16, ptr_count);

        if value.data_size == 1 {
            // A single-bit struct: copy the one bool.
            *ptr = u8::from(value.get_bool_field(0));
        } else {
            ptr::copy_nonoverlapping::<u8>(value.data, ptr, data_bytes as usize);
        }

        let pointer_section = ptr.add(data_words as usize * BYTES_PER_WORD) as *mut WirePointer;
        for i in 0..ptr_count as usize {
            copy_pointer(
                arena,
                segment_id,
                pointer_section.add(i),
                value.arena,
                value.segment_id,
                value.pointers.add(i),
                value.nesting_limit,
            )?;
        }

        Ok(())
    }

    /// Deep-copies a list value into a pointer slot.
    pub unsafe fn set_list_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: *mut WirePointer,
        value: ListReader,
    ) -> Result<()> {
        let total_size =
            round_bits_up_to_words(u64::from(value.element_count) * u64::from(value.step));

        if value.element_size == InlineComposite {
            return set_composite_list_pointer(arena, segment_id, reff, value, total_size);
        }

        let (ptr, reff, segment_id) =
            allocate(arena, reff, segment_id, total_size, WirePointerKind::List);

        if value.struct_pointer_count == 1 {
            // List of pointers.
            (*reff).set_list_size_and_count(Pointer, value.element_count);
            for i in 0..value.element_count as usize {
                copy_pointer(
                    arena,
                    segment_id,
                    (ptr as *mut WirePointer).add(i),
                    value.arena,
                    value.segment_id,
                    (value.ptr as *const WirePointer).add(i),
                    value.nesting_limit,
                )?;
            }
            return Ok(());
        }

        // List of data.
        let element_size = match value.step {
            0 => Void,
            1 => Bit,
            8 => Byte,
            16 => TwoBytes,
            32 => FourBytes,
            64 => EightBytes,
            _ => panic!("invalid list step size: {}", value.step),
        };

        (*reff).set_list_size_and_count(element_size, value.element_count);

        // Copy only whole bytes that belong to the list, plus the in-use
        // bits of a trailing partial byte.
        let total_bits = u64::from(value.element_count) * u64::from(value.step);
        let whole_bytes = (total_bits / BITS_PER_BYTE as u64) as usize;
        ptr::copy_nonoverlapping(value.ptr, ptr, whole_bytes);
        let leftover_bits = total_bits % BITS_PER_BYTE as u64;
        if leftover_bits > 0 {
            let mask: u8 = (1 << leftover_bits as u8) - 1;
            *ptr.add(whole_bytes) = mask & (*value.ptr.add(whole_bytes));
        }
        Ok(())
    }

    unsafe fn set_composite_list_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: *mut WirePointer,
        value: ListReader,
        body_words: WordCount32,
    ) -> Result<()> {
        let data_words = value.struct_data_size as usize / BITS_PER_WORD;
        let pointer_count = value.struct_pointer_count;

        let (ptr, reff, segment_id) = allocate(
            arena,
            reff,
            segment_id,
            body_words + POINTER_SIZE_IN_WORDS as u32,
            WirePointerKind::List,
        );
        (*reff).set_list_inline_composite(body_words);

        let tag = ptr as *mut WirePointer;
        (*tag).set_kind_and_inline_composite_list_element_count(
            WirePointerKind::Struct,
            value.element_count,
        );
        (*tag).set_struct_size_from_pieces(data_words as u16, pointer_count);

        let elements = ptr.add(BYTES_PER_WORD);
        let step_bytes = (data_words + pointer_count as usize) * BYTES_PER_WORD;

        for i in 0..value.element_count as usize {
            let src = value.ptr.add(i * step_bytes);
            let dst = elements.add(i * step_bytes);
            ptr::copy_nonoverlapping(src, dst, data_words * BYTES_PER_WORD);

            let src_pointers = src.add(data_words * BYTES_PER_WORD) as *const WirePointer;
            let dst_pointers = dst.add(data_words * BYTES_PER_WORD) as *mut WirePointer;
            for j in 0..pointer_count as usize {
                copy_pointer(
                    arena,
                    segment_id,
                    dst_pointers.add(j),
                    value.arena,
                    value.segment_id,
                    src_pointers.add(j),
                    value.nesting_limit,
                )?;
            }
        }
        Ok(())
    }

    pub unsafe fn set_object_pointer(
        arena: &mut dyn BuilderArena,
        segment_id: u32,
        reff: *mut WirePointer,
        value: &ObjectReader,
    ) -> Result<()> {
        match value {
            ObjectReader::Null => {
                ptr::write_bytes(reff as *mut u8, 0, BYTES_PER_WORD);
                Ok(())
            }
            ObjectReader::Struct(s) => set_struct_pointer(arena, segment_id, reff, *s),
            ObjectReader::List(l) => set_list_pointer(arena, segment_id, reff, *l),
        }
    }

    /// Deep-copies whatever `src` references (struct, list, or null) into
    /// `dst`, validating the source as it goes. Unlike the read
    /// operations, a validation failure in the source fails the copy.
    pub unsafe fn copy_pointer(
        dst_arena: &mut dyn BuilderArena,
        dst_segment_id: u32,
        dst: *mut WirePointer,
        src_arena: &dyn ReaderArena,
        src_segment_id: u32,
        src: *const WirePointer,
        nesting_limit: i32,
    ) -> Result<()> {
        match read_object_value(src_arena, src_segment_id, src, nesting_limit)? {
            ObjectReader::Null => {
                ptr::write_bytes(dst as *mut u8, 0, BYTES_PER_WORD);
                Ok(())
            }
            ObjectReader::Struct(value) => {
                set_struct_pointer(dst_arena, dst_segment_id, dst, value)
            }
            ObjectReader::List(value) => set_list_pointer(dst_arena, dst_segment_id, dst, value),
        }
    }

    // ---------------------------------------------------------------------
    // Read views
    //
    // Each read operation is split in two: a `*_value` function that
    // resolves and validates the actual wire data, and a public wrapper
    // that, on failure, hands the error to the arena and substitutes the
    // default value. A strict arena hands the error back instead.

    /// Builds a struct view over an already-resolved (non-far) struct
    /// pointer.
    unsafe fn struct_view<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        ptr: *const u8,
        nesting_limit: i32,
    ) -> Result<StructReader<'a>> {
        bounds_check(arena, segment_id, ptr, (*reff).struct_word_size() as usize)?;

        let data_words = (*reff).struct_data_size();
        Ok(StructReader {
            arena,
            segment_id,
            data: ptr,
            pointers: ptr.add(data_words as usize * BYTES_PER_WORD) as *const _,
            data_size: u32::from(data_words) * BITS_PER_WORD as BitCount32,
            pointer_count: (*reff).struct_ptr_count(),
            bit0_offset: 0,
            nesting_limit: nesting_limit - 1,
        })
    }

    /// The (element count, step bits, data-section bits, pointer count)
    /// described by a composite list's tag word.
    unsafe fn composite_shape(
        tag: *const WirePointer,
    ) -> Result<(ElementCount32, BitCount32, BitCount32, WirePointerCount16)> {
        if (*tag).kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(ErrorKind::NonStructInlineComposite));
        }
        Ok((
            (*tag).inline_composite_list_element_count(),
            (*tag).struct_word_size() * BITS_PER_WORD as u32,
            u32::from((*tag).struct_data_size()) * BITS_PER_WORD as u32,
            (*tag).struct_ptr_count(),
        ))
    }

    /// Builds a list view over an already-resolved list pointer, applying
    /// the expected-size coercions.
    unsafe fn list_view<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        ptr: *const u8,
        expected: Option<ElementSize>,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        let element_size = (*reff).list_element_size();

        if element_size != InlineComposite {
            // A primitive or pointer list; any such list also serves as a
            // valid struct-list view (bit lists become lists of single-bit
            // structs).
            let data_bits = data_bits_per_element(element_size);
            let pointer_count = pointers_per_element(element_size);
            let element_count = (*reff).list_element_count();
            let step = data_bits + pointer_count * BITS_PER_POINTER as u32;

            let word_count = round_bits_up_to_words(u64::from(element_count) * u64::from(step));
            bounds_check(arena, segment_id, ptr, word_count as usize)?;

            if element_size == Void {
                // Lists of void claim elements without carrying data;
                // charge the limiter for them.
                amplified_read(arena, u64::from(element_count))?;
            }

            if let Some(expected) = expected {
                // Verify the elements are at least as large as expected. An
                // expected size of InlineComposite imposes nothing here;
                // field accesses bounds-check instead.
                if data_bits_per_element(expected) > data_bits
                    || pointers_per_element(expected) > pointer_count
                {
                    return Err(Error::from_kind(ErrorKind::IncompatibleListElement));
                }
            }

            return Ok(ListReader {
                arena,
                segment_id,
                ptr,
                element_count,
                element_size,
                step,
                struct_data_size: data_bits,
                struct_pointer_count: pointer_count as u16,
                nesting_limit: nesting_limit - 1,
            });
        }

        // The tag word is formatted like a struct pointer whose offset
        // field carries the element count.
        let declared_words = (*reff).list_inline_composite_word_count();
        bounds_check(arena, segment_id, ptr, declared_words as usize + 1)?;

        let (element_count, step_bits, data_bits, pointer_count) =
            composite_shape(ptr as *const WirePointer)?;
        let mut elements = ptr.add(BYTES_PER_WORD);

        let step_words = u64::from(step_bits) / BITS_PER_WORD as u64;
        if u64::from(element_count) * step_words > u64::from(declared_words) {
            return Err(Error::from_kind(ErrorKind::InlineCompositeOverrun));
        }

        if step_words == 0 {
            // Lists of zero-sized structs claim elements without carrying
            // data; charge the limiter for them.
            amplified_read(arena, u64::from(element_count))?;
        }

        // If a non-struct list was expected, a primitive list was
        // presumably upgraded to a struct list, and the element pointer is
        // coerced so that each element's relevant field lines up.
        match expected {
            None | Some(Void | InlineComposite) => {}
            Some(Bit) => {
                return Err(Error::from_kind(ErrorKind::ExpectedBitList));
            }
            Some(Byte | TwoBytes | FourBytes | EightBytes) => {
                if data_bits == 0 {
                    return Err(Error::from_kind(ErrorKind::ExpectedPrimitiveList));
                }
            }
            Some(Pointer) => {
                if pointer_count == 0 {
                    return Err(Error::from_kind(ErrorKind::ExpectedPointerList));
                }
                // Serve reads out of the pointer sections.
                elements = elements.add(data_bits as usize / BITS_PER_BYTE);
            }
        }

        Ok(ListReader {
            arena,
            segment_id,
            ptr: elements,
            element_count,
            element_size,
            step: step_bits,
            struct_data_size: data_bits,
            struct_pointer_count: pointer_count,
            nesting_limit: nesting_limit - 1,
        })
    }

    unsafe fn read_struct_value<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        nesting_limit: i32,
    ) -> Result<StructReader<'a>> {
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }
        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;
        if (*reff).kind() != WirePointerKind::Struct {
            return Err(Error::from_kind(ErrorKind::ExpectedStructPointer));
        }
        struct_view(arena, segment_id, reff, ptr, nesting_limit)
    }

    unsafe fn default_struct_reader<'a>(
        default: Option<&'a [crate::Word]>,
    ) -> Result<StructReader<'a>> {
        match default {
            Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                read_struct_value(&super::NULL_ARENA, 0, d.as_ptr() as *const _, i32::MAX)
            }
            _ => Ok(StructReader::new_default()),
        }
    }

    #[inline]
    pub unsafe fn read_struct_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        default: Option<&'a [crate::Word]>,
        nesting_limit: i32,
    ) -> Result<StructReader<'a>> {
        if (*reff).is_null() {
            return default_struct_reader(default);
        }
        match read_struct_value(arena, segment_id, reff, nesting_limit) {
            Ok(view) => Ok(view),
            Err(e) => {
                arena.recoverable(e)?;
                default_struct_reader(default)
            }
        }
    }

    unsafe fn read_list_value<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        expected: Option<ElementSize>,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }
        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;
        if (*reff).kind() != WirePointerKind::List {
            return Err(Error::from_kind(ErrorKind::ExpectedListPointer));
        }
        list_view(arena, segment_id, reff, ptr, expected, nesting_limit)
    }

    unsafe fn default_list_reader<'a>(
        default: Option<&'a [crate::Word]>,
        expected: Option<ElementSize>,
    ) -> Result<ListReader<'a>> {
        match default {
            Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                read_list_value(&super::NULL_ARENA, 0, d.as_ptr() as *const _, expected, i32::MAX)
            }
            _ => Ok(ListReader::new_default()),
        }
    }

    #[inline]
    pub unsafe fn read_list_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        default: Option<&'a [crate::Word]>,
        expected: Option<ElementSize>,
        nesting_limit: i32,
    ) -> Result<ListReader<'a>> {
        if (*reff).is_null() {
            return default_list_reader(default, expected);
        }
        match read_list_value(arena, segment_id, reff, expected, nesting_limit) {
            Ok(view) => Ok(view),
            Err(e) => {
                arena.recoverable(e)?;
                default_list_reader(default, expected)
            }
        }
    }

    unsafe fn read_text_value<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
    ) -> Result<text::Reader<'a>> {
        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;

        if (*reff).kind() != WirePointerKind::List || (*reff).list_element_size() != Byte {
            return Err(Error::from_kind(ErrorKind::ExpectedTextList));
        }

        let size = (*reff).list_element_count();
        bounds_check(arena, segment_id, ptr, round_bytes_up_to_words(size) as usize)?;

        // The element count includes a NUL terminator; the view does not.
        if size == 0 || *ptr.add(size as usize - 1) != 0u8 {
            return Err(Error::from_kind(ErrorKind::TextMissingNulTerminator));
        }

        Ok(text::Reader(slice::from_raw_parts(ptr, size as usize - 1)))
    }

    #[inline]
    pub unsafe fn read_text_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        default: Option<&'a [u8]>,
    ) -> Result<text::Reader<'a>> {
        if (*reff).is_null() {
            return Ok(text::Reader(default.unwrap_or(b"")));
        }
        match read_text_value(arena, segment_id, reff) {
            Ok(view) => Ok(view),
            Err(e) => {
                arena.recoverable(e)?;
                Ok(text::Reader(default.unwrap_or(b"")))
            }
        }
    }

    unsafe fn read_data_value<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
    ) -> Result<data::Reader<'a>> {
        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;

        if (*reff).kind() != WirePointerKind::List || (*reff).list_element_size() != Byte {
            return Err(Error::from_kind(ErrorKind::ExpectedDataList));
        }

        let size = (*reff).list_element_count();
        bounds_check(arena, segment_id, ptr, round_bytes_up_to_words(size) as usize)?;

        Ok(data::reader_from_raw_parts(ptr, size))
    }

    #[inline]
    pub unsafe fn read_data_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        default: Option<&'a [u8]>,
    ) -> Result<data::Reader<'a>> {
        if (*reff).is_null() {
            return Ok(default.unwrap_or(&[]));
        }
        match read_data_value(arena, segment_id, reff) {
            Ok(view) => Ok(view),
            Err(e) => {
                arena.recoverable(e)?;
                Ok(default.unwrap_or(&[]))
            }
        }
    }

    /// Resolves whatever a pointer references into a typed view, without
    /// expecting a particular type. Also the workhorse behind
    /// `copy_pointer`.
    unsafe fn read_object_value<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        nesting_limit: i32,
    ) -> Result<ObjectReader<'a>> {
        if (*reff).is_null() {
            return Ok(ObjectReader::Null);
        }
        if nesting_limit <= 0 {
            return Err(Error::from_kind(ErrorKind::NestingLimitExceeded));
        }

        let (ptr, reff, segment_id) = follow_fars(arena, reff, segment_id)?;

        match (*reff).kind() {
            WirePointerKind::Struct => Ok(ObjectReader::Struct(struct_view(
                arena,
                segment_id,
                reff,
                ptr,
                nesting_limit,
            )?)),
            WirePointerKind::List => Ok(ObjectReader::List(list_view(
                arena,
                segment_id,
                reff,
                ptr,
                None,
                nesting_limit,
            )?)),
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::UnexpectedFarPointer)),
            WirePointerKind::Reserved => Err(Error::from_kind(ErrorKind::UnknownPointerKind)),
        }
    }

    unsafe fn default_object_reader<'a>(
        default: Option<&'a [crate::Word]>,
    ) -> Result<ObjectReader<'a>> {
        match default {
            Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                read_object_value(&super::NULL_ARENA, 0, d.as_ptr() as *const _, i32::MAX)
            }
            _ => Ok(ObjectReader::Null),
        }
    }

    pub unsafe fn read_object_pointer<'a>(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        reff: *const WirePointer,
        default: Option<&'a [crate::Word]>,
        nesting_limit: i32,
    ) -> Result<ObjectReader<'a>> {
        if (*reff).is_null() {
            return default_object_reader(default);
        }
        match read_object_value(arena, segment_id, reff, nesting_limit) {
            Ok(view) => Ok(view),
            Err(e) => {
                arena.recoverable(e)?;
                default_object_reader(default)
            }
        }
    }

    /// Builder-side counterpart of `read_object_pointer`: a view of
    /// whatever the slot already holds.
    pub unsafe fn get_writable_object_pointer<'a>(
        arena: &'a mut dyn BuilderArena,
        mut reff: *mut WirePointer,
        mut segment_id: u32,
        default: Option<&[crate::Word]>,
    ) -> Result<ObjectBuilder<'a>> {
        let mut ref_target = WirePointer::mut_target(reff);

        if (*reff).is_null() {
            match default {
                Some(d) if !(*(d.as_ptr() as *const WirePointer)).is_null() => {
                    let (new_target, new_ref, new_segment_id) =
                        copy_message(arena, segment_id, reff, d.as_ptr() as *const WirePointer);
                    ref_target = new_target;
                    reff = new_ref;
                    segment_id = new_segment_id;
                }
                _ => return Ok(ObjectBuilder::Null),
            }
        }

        let (mut ptr, reff, segment_id) =
            follow_builder_fars(arena, reff, ref_target, segment_id)?;

        match (*reff).kind() {
            WirePointerKind::Struct => {
                let data_words = (*reff).struct_data_size();
                Ok(ObjectBuilder::Struct(StructBuilder {
                    arena,
                    segment_id,
                    data: ptr,
                    pointers: ptr.add(data_words as usize * BYTES_PER_WORD) as *mut _,
                    data_size: u32::from(data_words) * BITS_PER_WORD as u32,
                    pointer_count: (*reff).struct_ptr_count(),
                    bit0_offset: 0,
                }))
            }
            WirePointerKind::List => {
                let element_size = (*reff).list_element_size();
                if element_size == InlineComposite {
                    let (element_count, step_bits, data_bits, pointer_count) =
                        composite_shape(ptr as *const WirePointer)?;
                    ptr = ptr.add(BYTES_PER_WORD);

                    Ok(ObjectBuilder::List(ListBuilder {
                        arena,
                        segment_id,
                        ptr,
                        element_count,
                        element_size,
                        step: step_bits,
                        struct_data_size: data_bits,
                        struct_pointer_count: pointer_count,
                    }))
                } else {
                    let data_bits = data_bits_per_element(element_size);
                    let pointer_count = pointers_per_element(element_size);
                    Ok(ObjectBuilder::List(ListBuilder {
                        arena,
                        segment_id,
                        ptr,
                        element_count: (*reff).list_element_count(),
                        element_size,
                        step: data_bits + pointer_count * BITS_PER_POINTER as u32,
                        struct_data_size: data_bits,
                        struct_pointer_count: pointer_count as u16,
                    }))
                }
            }
            WirePointerKind::Far => Err(Error::from_kind(ErrorKind::UnexpectedFarPointer)),
            WirePointerKind::Reserved => Err(Error::from_kind(ErrorKind::UnknownPointerKind)),
        }
    }
}

static ZERO: u64 = 0;
fn zero_pointer() -> *const WirePointer {
    &ZERO as *const _ as *const _
}

static NULL_ARENA: NullArena = NullArena;

/// A dynamically-typed value read out of a pointer field.
pub enum ObjectReader<'a> {
    Null,
    Struct(StructReader<'a>),
    List(ListReader<'a>),
}

/// A dynamically-typed view of whatever a builder's pointer field holds.
pub enum ObjectBuilder<'a> {
    Null,
    Struct(StructBuilder<'a>),
    List(ListBuilder<'a>),
}

#[derive(Clone, Copy)]
pub struct PointerReader<'a> {
    arena: &'a dyn ReaderArena,
    pointer: *const WirePointer,
    segment_id: u32,
    nesting_limit: i32,
}

impl<'a> PointerReader<'a> {
    pub fn new_default<'b>() -> PointerReader<'b> {
        PointerReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            pointer: ptr::null(),
            nesting_limit: i32::MAX,
        }
    }

    pub fn get_root(
        arena: &'a dyn ReaderArena,
        segment_id: u32,
        location: *const u8,
        nesting_limit: i32,
    ) -> Result<Self> {
        if let Err(e) = wire_ops::bounds_check(arena, segment_id, location, POINTER_SIZE_IN_WORDS)
        {
            // Like any other read, an unreadable root degrades to a
            // default (null) reader unless the arena is strict.
            arena.recoverable(e)?;
            return Ok(PointerReader::new_default());
        }

        Ok(PointerReader {
            arena,
            segment_id,
            pointer: location as *const _,
            nesting_limit,
        })
    }

    /// Interprets `location` as a root pointer without any arena or bounds
    /// checking. For trusted flat data such as constants embedded in
    /// generated code.
    ///
    /// # Safety
    ///
    /// `location` must point at a well-formed, flat (single-"segment")
    /// message fragment that outlives `'b`.
    pub unsafe fn get_root_unchecked<'b>(location: *const u8) -> PointerReader<'b> {
        PointerReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            pointer: location as *const _,
            nesting_limit: i32::MAX,
        }
    }

    /// The wire pointer this reader denotes; an all-zero word when the
    /// reader is itself a default.
    fn slot(&self) -> *const WirePointer {
        if self.pointer.is_null() {
            zero_pointer()
        } else {
            self.pointer
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.pointer.is_null() || unsafe { (*self.pointer).is_null() }
    }

    /// Counts the words reachable through this pointer. The traversal is
    /// refunded to the read limiter, since the caller almost always
    /// traverses the object again right away (e.g. to copy it).
    pub fn total_size(&self) -> Result<MessageSize> {
        if self.pointer.is_null() {
            return Ok(MessageSize::default());
        }
        let result = unsafe {
            wire_ops::total_size(self.arena, self.segment_id, self.pointer, self.nesting_limit)
        }?;
        self.arena.unread(result.word_count);
        Ok(result)
    }

    pub fn get_struct(self, default: Option<&'a [crate::Word]>) -> Result<StructReader<'a>> {
        unsafe {
            wire_ops::read_struct_pointer(
                self.arena,
                self.segment_id,
                self.slot(),
                default,
                self.nesting_limit,
            )
        }
    }

    pub fn get_list(
        self,
        expected_element_size: ElementSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<ListReader<'a>> {
        unsafe {
            wire_ops::read_list_pointer(
                self.arena,
                self.segment_id,
                self.slot(),
                default,
                Some(expected_element_size),
                self.nesting_limit,
            )
        }
    }

    pub fn get_text(self, default: Option<&'a [u8]>) -> Result<text::Reader<'a>> {
        unsafe { wire_ops::read_text_pointer(self.arena, self.segment_id, self.slot(), default) }
    }

    pub fn get_data(&self, default: Option<&'a [u8]>) -> Result<data::Reader<'a>> {
        unsafe { wire_ops::read_data_pointer(self.arena, self.segment_id, self.slot(), default) }
    }

    pub fn get_object(self, default: Option<&'a [crate::Word]>) -> Result<ObjectReader<'a>> {
        unsafe {
            wire_ops::read_object_pointer(
                self.arena,
                self.segment_id,
                self.slot(),
                default,
                self.nesting_limit,
            )
        }
    }
}

pub struct PointerBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    pointer: *mut WirePointer,
    segment_id: u32,
}

impl<'a> PointerBuilder<'a> {
    #[inline]
    pub fn get_root(arena: &'a mut dyn BuilderArena, segment_id: u32, location: *mut u8) -> Self {
        PointerBuilder {
            arena,
            segment_id,
            pointer: location as *mut _,
        }
    }

    #[inline]
    pub fn reborrow(&mut self) -> PointerBuilder<'_> {
        PointerBuilder {
            arena: self.arena,
            ..*self
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        unsafe { (*self.pointer).is_null() }
    }

    pub fn get_struct(
        self,
        size: StructSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<StructBuilder<'a>> {
        unsafe {
            wire_ops::get_writable_struct_pointer(
                self.arena,
                self.pointer,
                self.segment_id,
                size,
                default,
            )
        }
    }

    pub fn get_list(
        self,
        element_size: ElementSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<ListBuilder<'a>> {
        unsafe {
            wire_ops::get_writable_list_pointer(
                self.arena,
                self.pointer,
                self.segment_id,
                element_size,
                default,
            )
        }
    }

    pub fn get_struct_list(
        self,
        element_size: StructSize,
        default: Option<&'a [crate::Word]>,
    ) -> Result<ListBuilder<'a>> {
        unsafe {
            wire_ops::get_writable_struct_list_pointer(
                self.arena,
                self.pointer,
                self.segment_id,
                element_size,
                default,
            )
        }
    }

    pub fn get_text(self, default: Option<&[u8]>) -> Result<text::Builder<'a>> {
        unsafe {
            wire_ops::get_writable_text_pointer(self.arena, self.pointer, self.segment_id, default)
        }
    }

    pub fn get_data(self, default: Option<&[u8]>) -> Result<data::Builder<'a>> {
        unsafe {
            wire_ops::get_writable_data_pointer(self.arena, self.pointer, self.segment_id, default)
        }
    }

    pub fn get_object(self, default: Option<&[crate::Word]>) -> Result<ObjectBuilder<'a>> {
        unsafe {
            wire_ops::get_writable_object_pointer(self.arena, self.pointer, self.segment_id, default)
        }
    }

    pub fn init_struct(self, size: StructSize) -> StructBuilder<'a> {
        unsafe { wire_ops::init_struct_pointer(self.arena, self.pointer, self.segment_id, size) }
    }

    pub fn init_list(
        self,
        element_size: ElementSize,
        element_count: ElementCount32,
    ) -> ListBuilder<'a> {
        unsafe {
            wire_ops::init_list_pointer(
                self.arena,
                self.pointer,
                self.segment_id,
                element_count,
                element_size,
            )
        }
    }

    pub fn init_struct_list(
        self,
        element_count: ElementCount32,
        element_size: StructSize,
    ) -> ListBuilder<'a> {
        unsafe {
            wire_ops::init_struct_list_pointer(
                self.arena,
                self.pointer,
                self.segment_id,
                element_count,
                element_size,
            )
        }
    }

    pub fn init_text(self, size: ByteCount32) -> text::Builder<'a> {
        unsafe { wire_ops::init_text_pointer(self.arena, self.pointer, self.segment_id, size) }
    }

    pub fn init_data(self, size: ByteCount32) -> data::Builder<'a> {
        unsafe { wire_ops::init_data_pointer(self.arena, self.pointer, self.segment_id, size) }
    }

    pub fn set_struct(&mut self, value: &StructReader) -> Result<()> {
        unsafe { wire_ops::set_struct_pointer(self.arena, self.segment_id, self.pointer, *value) }
    }

    pub fn set_list(&mut self, value: &ListReader) -> Result<()> {
        unsafe { wire_ops::set_list_pointer(self.arena, self.segment_id, self.pointer, *value) }
    }

    pub fn set_text(&mut self, value: text::Reader<'_>) {
        unsafe {
            wire_ops::set_text_pointer(self.arena, self.pointer, self.segment_id, value);
        }
    }

    pub fn set_data(&mut self, value: &[u8]) {
        unsafe {
            wire_ops::set_data_pointer(self.arena, self.pointer, self.segment_id, value);
        }
    }

    pub fn set_object(&mut self, value: &ObjectReader) -> Result<()> {
        unsafe { wire_ops::set_object_pointer(self.arena, self.segment_id, self.pointer, value) }
    }

    /// Deep-copies the value `other` references into this slot, zeroing
    /// whatever the slot held before.
    pub fn copy_from(&mut self, other: PointerReader) -> Result<()> {
        if other.pointer.is_null() {
            if !self.pointer.is_null() {
                self.clear();
            }
            return Ok(());
        }
        unsafe {
            wire_ops::copy_pointer(
                self.arena,
                self.segment_id,
                self.pointer,
                other.arena,
                other.segment_id,
                other.pointer,
                other.nesting_limit,
            )
        }
    }

    pub fn clear(&mut self) {
        unsafe {
            wire_ops::zero_object(self.arena, self.segment_id, self.pointer);
            ptr::write_bytes(self.pointer as *mut u8, 0, BYTES_PER_WORD);
        }
    }

    pub fn as_reader(&self) -> PointerReader<'_> {
        PointerReader {
            arena: self.arena.as_reader(),
            segment_id: self.segment_id,
            pointer: self.pointer,
            nesting_limit: i32::MAX,
        }
    }

    pub fn into_reader(self) -> PointerReader<'a> {
        PointerReader {
            arena: self.arena.as_reader(),
            segment_id: self.segment_id,
            pointer: self.pointer,
            nesting_limit: i32::MAX,
        }
    }
}

#[derive(Clone, Copy)]
pub struct StructReader<'a> {
    arena: &'a dyn ReaderArena,
    data: *const u8,
    pointers: *const WirePointer,
    segment_id: u32,
    data_size: BitCount32,
    pointer_count: WirePointerCount16,

    /// When a single bool element of a bit list is viewed as a 1-bit
    /// struct, this is the element's bit position within its byte; bool
    /// field 0 reads that bit instead of bit 0.
    bit0_offset: BitCount8,

    nesting_limit: i32,
}

impl<'a> core::fmt::Debug for StructReader<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StructReader").finish()
    }
}

impl<'a> StructReader<'a> {
    pub fn new_default<'b>() -> StructReader<'b> {
        StructReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            data: ptr::null(),
            pointers: ptr::null(),
            data_size: 0,
            pointer_count: 0,
            bit0_offset: 0,
            nesting_limit: i32::MAX,
        }
    }

    pub fn get_data_section_size(&self) -> BitCount32 {
        self.data_size
    }

    pub fn get_pointer_section_size(&self) -> WirePointerCount16 {
        self.pointer_count
    }

    pub fn get_data_section_as_blob(&self) -> &'a [u8] {
        if self.data_size == 0 {
            // Don't form a slice from a null pointer.
            &[]
        } else {
            unsafe {
                core::slice::from_raw_parts(self.data, self.data_size as usize / BITS_PER_BYTE)
            }
        }
    }

    /// Reads a primitive field. Fields beyond the struct's actual data
    /// section — i.e. fields added by a newer schema than the one that
    /// wrote this value — read as zero.
    #[inline]
    pub fn get_data_field<T: Endian + Default>(&self, offset: ElementCount) -> T {
        if (offset + 1) * bits_per_element::<T>() <= self.data_size as usize {
            let dwv: *const WireValue<T> = self.data as *const _;
            unsafe { (*dwv.add(offset)).get() }
        } else {
            T::default()
        }
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        let mut boffset: BitCount32 = offset as BitCount32;
        if boffset < self.data_size {
            if offset == 0 {
                boffset = BitCount32::from(self.bit0_offset);
            }
            unsafe {
                let b: *const u8 = self.data.add(boffset as usize / BITS_PER_BYTE);
                ((*b) & (1u8 << (boffset as usize % BITS_PER_BYTE))) != 0
            }
        } else {
            false
        }
    }

    #[inline]
    pub fn get_data_field_mask<T: Endian + Default + Mask>(
        &self,
        offset: ElementCount,
        mask: <T as Mask>::T,
    ) -> T {
        Mask::mask(self.get_data_field(offset), mask)
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    #[inline]
    pub fn get_pointer_field(&self, ptr_index: WirePointerCount) -> PointerReader<'a> {
        if ptr_index < self.pointer_count as WirePointerCount {
            PointerReader {
                arena: self.arena,
                segment_id: self.segment_id,
                pointer: unsafe { self.pointers.add(ptr_index) },
                nesting_limit: self.nesting_limit,
            }
        } else {
            PointerReader::new_default()
        }
    }

    /// Whether the pointer field is present on the wire. Note that this is
    /// false both for an absent field and for a field explicitly pointing
    /// at an empty default, so it cannot distinguish the two.
    #[inline]
    pub fn is_pointer_field_null(&self, ptr_index: WirePointerCount) -> bool {
        if ptr_index < self.pointer_count as WirePointerCount {
            unsafe { (*self.pointers.add(ptr_index)).is_null() }
        } else {
            true
        }
    }

    /// Counts the words this struct and everything it references occupy.
    /// The traversal is refunded to the read limiter, since the caller is
    /// likely to re-traverse the value (e.g. to copy it).
    pub fn total_size(&self) -> Result<MessageSize> {
        let mut result = MessageSize {
            word_count: u64::from(wire_ops::round_bits_up_to_words(u64::from(self.data_size)))
                + u64::from(self.pointer_count) * WORDS_PER_POINTER as u64,
        };

        for i in 0..self.pointer_count as usize {
            unsafe {
                result += wire_ops::total_size(
                    self.arena,
                    self.segment_id,
                    self.pointers.add(i),
                    self.nesting_limit,
                )?;
            }
        }

        self.arena.unread(result.word_count);

        Ok(result)
    }
}

pub struct StructBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    data: *mut u8,
    pointers: *mut WirePointer,
    segment_id: u32,
    data_size: BitCount32,
    pointer_count: WirePointerCount16,
    bit0_offset: BitCount8,
}

impl<'a> StructBuilder<'a> {
    #[inline]
    pub fn reborrow(&mut self) -> StructBuilder<'_> {
        StructBuilder {
            arena: self.arena,
            ..*self
        }
    }

    pub fn as_reader(&self) -> StructReader<'_> {
        StructReader {
            arena: self.arena.as_reader(),
            data: self.data,
            pointers: self.pointers,
            pointer_count: self.pointer_count,
            segment_id: self.segment_id,
            data_size: self.data_size,
            bit0_offset: self.bit0_offset,
            nesting_limit: i32::MAX,
        }
    }

    pub fn into_reader(self) -> StructReader<'a> {
        StructReader {
            arena: self.arena.as_reader(),
            data: self.data,
            pointers: self.pointers,
            pointer_count: self.pointer_count,
            segment_id: self.segment_id,
            data_size: self.data_size,
            bit0_offset: self.bit0_offset,
            nesting_limit: i32::MAX,
        }
    }

    #[inline]
    pub fn set_data_field<T: Endian>(&self, offset: ElementCount, value: T) {
        let ptr: *mut WireValue<T> = self.data as *mut _;
        unsafe { (*ptr.add(offset)).set(value) }
    }

    #[inline]
    pub fn set_data_field_mask<T: Endian + Mask>(
        &self,
        offset: ElementCount,
        value: T,
        mask: <T as Mask>::T,
    ) {
        self.set_data_field(offset, Mask::mask(value, mask));
    }

    #[inline]
    pub fn get_data_field<T: Endian>(&self, offset: ElementCount) -> T {
        let ptr: *const WireValue<T> = self.data as *const _;
        unsafe { (*ptr.add(offset)).get() }
    }

    #[inline]
    pub fn get_data_field_mask<T: Endian + Mask>(
        &self,
        offset: ElementCount,
        mask: <T as Mask>::T,
    ) -> T {
        Mask::mask(self.get_data_field(offset), mask)
    }

    #[inline]
    pub fn set_bool_field(&self, offset: ElementCount, value: bool) {
        let mut boffset: BitCount0 = offset;
        if offset == 0 {
            boffset = self.bit0_offset as BitCount0;
        }
        let b = unsafe { self.data.add(boffset / BITS_PER_BYTE) };
        let bitnum = boffset % BITS_PER_BYTE;
        unsafe { (*b) = ((*b) & !(1 << bitnum)) | (u8::from(value) << bitnum) }
    }

    #[inline]
    pub fn set_bool_field_mask(&self, offset: ElementCount, value: bool, mask: bool) {
        self.set_bool_field(offset, value ^ mask);
    }

    #[inline]
    pub fn get_bool_field(&self, offset: ElementCount) -> bool {
        let mut boffset: BitCount0 = offset;
        if offset == 0 {
            boffset = self.bit0_offset as BitCount0;
        }
        let b = unsafe { self.data.add(boffset / BITS_PER_BYTE) };
        unsafe { ((*b) & (1 << (boffset % BITS_PER_BYTE))) != 0 }
    }

    #[inline]
    pub fn get_bool_field_mask(&self, offset: ElementCount, mask: bool) -> bool {
        self.get_bool_field(offset) ^ mask
    }

    #[inline]
    pub fn get_pointer_field(self, ptr_index: WirePointerCount) -> PointerBuilder<'a> {
        PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: unsafe { self.pointers.add(ptr_index) },
        }
    }

    #[inline]
    pub fn get_pointer_field_mut(&mut self, ptr_index: WirePointerCount) -> PointerBuilder<'_> {
        PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: unsafe { self.pointers.add(ptr_index) },
        }
    }

    #[inline]
    pub fn is_pointer_field_null(&self, ptr_index: WirePointerCount) -> bool {
        unsafe { (*self.pointers.add(ptr_index)).is_null() }
    }

    /// Overwrites this struct's content with a copy of `other`, truncating
    /// or zero-extending sections as needed.
    pub fn copy_content_from(&mut self, other: &StructReader) -> Result<()> {
        let shared_data_size = self.data_size.min(other.data_size);
        let shared_pointer_count = self.pointer_count.min(other.pointer_count);

        if (shared_data_size > 0 && core::ptr::eq(other.data, self.data))
            || (shared_pointer_count > 0 && core::ptr::eq(other.pointers, self.pointers))
        {
            // `other` aliases this very struct. Both section pointers must
            // agree (empty sections aside); then there is nothing to do.
            if (shared_data_size != 0 && !core::ptr::eq(other.data, self.data))
                || (shared_pointer_count != 0 && !core::ptr::eq(other.pointers, self.pointers))
            {
                return Err(Error::failed(
                    "struct copy source partially aliases its destination".into(),
                ));
            }
            return Ok(());
        }

        unsafe {
            if self.data_size > shared_data_size {
                // The target is larger than the source; zero the bits the
                // source does not provide.
                if self.data_size == 1 {
                    self.set_bool_field(0, false);
                } else {
                    let unshared = self
                        .data
                        .add((shared_data_size as usize) / BITS_PER_BYTE);
                    ptr::write_bytes(
                        unshared,
                        0,
                        ((self.data_size - shared_data_size) / BITS_PER_BYTE as u32) as usize,
                    );
                }
            }

            if shared_data_size == 1 {
                self.set_bool_field(0, other.get_bool_field(0));
            } else {
                ptr::copy_nonoverlapping(
                    other.data,
                    self.data,
                    (shared_data_size / BITS_PER_BYTE as u32) as usize,
                );
            }

            // Drop all existing pointers, then copy the shared ones over.
            for i in 0..self.pointer_count as usize {
                wire_ops::zero_object(self.arena, self.segment_id, self.pointers.add(i));
            }
            ptr::write_bytes(
                self.pointers as *mut u8,
                0u8,
                self.pointer_count as usize * BYTES_PER_WORD,
            );

            for i in 0..shared_pointer_count as usize {
                wire_ops::copy_pointer(
                    self.arena,
                    self.segment_id,
                    self.pointers.add(i),
                    other.arena,
                    other.segment_id,
                    other.pointers.add(i),
                    other.nesting_limit,
                )?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy)]
pub struct ListReader<'a> {
    arena: &'a dyn ReaderArena,
    ptr: *const u8,
    segment_id: u32,
    element_count: ElementCount32,
    step: BitCount32,
    struct_data_size: BitCount32,
    struct_pointer_count: WirePointerCount16,
    element_size: ElementSize,
    nesting_limit: i32,
}

impl<'a> ListReader<'a> {
    pub fn new_default<'b>() -> ListReader<'b> {
        ListReader {
            arena: &NULL_ARENA,
            segment_id: 0,
            ptr: ptr::null(),
            element_count: 0,
            element_size: Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
            nesting_limit: i32::MAX,
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Views element `index` as a struct. Works for every encoding: an
    /// element of a primitive list is a struct whose data section is the
    /// element itself, and a bit-list element is a 1-bit struct reached
    /// through `bit0_offset`.
    #[inline]
    pub fn get_struct_element(&self, index: ElementCount32) -> StructReader<'a> {
        let index_bit: u64 = u64::from(index) * u64::from(self.step);

        let struct_data: *const u8 =
            unsafe { self.ptr.add((index_bit / BITS_PER_BYTE as u64) as usize) };
        let struct_pointers: *const WirePointer =
            unsafe { struct_data.add(self.struct_data_size as usize / BITS_PER_BYTE) as *const _ };

        StructReader {
            arena: self.arena,
            segment_id: self.segment_id,
            data: struct_data,
            pointers: struct_pointers,
            data_size: self.struct_data_size,
            pointer_count: self.struct_pointer_count,
            bit0_offset: (index_bit % BITS_PER_BYTE as u64) as BitCount8,
            nesting_limit: self.nesting_limit - 1,
        }
    }

    #[inline]
    pub fn get_pointer_element(self, index: ElementCount32) -> PointerReader<'a> {
        let offset = (u64::from(index) * u64::from(self.step) / BITS_PER_BYTE as u64) as usize;
        PointerReader {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: unsafe { self.ptr.add(offset) } as *const _,
            nesting_limit: self.nesting_limit,
        }
    }
}

pub struct ListBuilder<'a> {
    arena: &'a mut dyn BuilderArena,
    ptr: *mut u8,
    segment_id: u32,
    element_count: ElementCount32,
    step: BitCount32,
    struct_data_size: BitCount32,
    struct_pointer_count: WirePointerCount16,
    element_size: ElementSize,
}

impl<'a> ListBuilder<'a> {
    #[inline]
    pub fn new_default(arena: &mut dyn BuilderArena) -> ListBuilder<'_> {
        ListBuilder {
            arena,
            segment_id: 0,
            ptr: ptr::null_mut(),
            element_count: 0,
            element_size: Void,
            step: 0,
            struct_data_size: 0,
            struct_pointer_count: 0,
        }
    }

    pub fn into_reader(self) -> ListReader<'a> {
        ListReader {
            arena: self.arena.as_reader(),
            segment_id: self.segment_id,
            ptr: self.ptr as *const _,
            element_count: self.element_count,
            element_size: self.element_size,
            step: self.step,
            struct_data_size: self.struct_data_size,
            struct_pointer_count: self.struct_pointer_count,
            nesting_limit: i32::MAX,
        }
    }

    #[inline]
    pub fn reborrow(&mut self) -> ListBuilder<'_> {
        ListBuilder {
            arena: self.arena,
            ..*self
        }
    }

    #[inline]
    pub fn len(&self) -> ElementCount32 {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get_struct_element(self, index: ElementCount32) -> StructBuilder<'a> {
        let index_bit = u64::from(index) * u64::from(self.step);
        let struct_data = unsafe { self.ptr.add((index_bit / BITS_PER_BYTE as u64) as usize) };
        let struct_pointers =
            unsafe { struct_data.add((self.struct_data_size as usize) / BITS_PER_BYTE) as *mut _ };
        StructBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            data: struct_data,
            pointers: struct_pointers,
            data_size: self.struct_data_size,
            pointer_count: self.struct_pointer_count,
            bit0_offset: (index_bit % BITS_PER_BYTE as u64) as BitCount8,
        }
    }

    #[inline]
    pub fn get_pointer_element(self, index: ElementCount32) -> PointerBuilder<'a> {
        let offset = (u64::from(index) * u64::from(self.step) / BITS_PER_BYTE as u64) as usize;
        PointerBuilder {
            arena: self.arena,
            segment_id: self.segment_id,
            pointer: unsafe { self.ptr.add(offset) } as *mut _,
        }
    }
}

/// An element type that can live in a `primitive_list`.
pub trait PrimitiveElement {
    /// Gets the element at `index`. Bounds checking is *not* performed.
    fn get(list_reader: &ListReader, index: ElementCount32) -> Self;

    /// Gets the element at `index` from a builder. Bounds checking is *not*
    /// performed.
    fn get_from_builder(list_builder: &ListBuilder, index: ElementCount32) -> Self;

    /// Sets the element at `index`. Bounds checking is *not* performed.
    fn set(list_builder: &ListBuilder, index: ElementCount32, value: Self);

    fn element_size() -> ElementSize;
}

macro_rules! primitive_element_impl {
    ($typ:ty, $size:ident) => {
        impl PrimitiveElement for $typ {
            #[inline]
            fn get(list: &ListReader, index: ElementCount32) -> Self {
                let offset = (u64::from(index) * u64::from(list.step) / BITS_PER_BYTE as u64) as usize;
                unsafe {
                    let ptr: *const WireValue<Self> = list.ptr.add(offset) as *const _;
                    (*ptr).get()
                }
            }

            #[inline]
            fn get_from_builder(list: &ListBuilder, index: ElementCount32) -> Self {
                let offset = (u64::from(index) * u64::from(list.step) / BITS_PER_BYTE as u64) as usize;
                unsafe {
                    let ptr: *mut WireValue<Self> = list.ptr.add(offset) as *mut _;
                    (*ptr).get()
                }
            }

            #[inline]
            fn set(list: &ListBuilder, index: ElementCount32, value: Self) {
                let offset = (u64::from(index) * u64::from(list.step) / BITS_PER_BYTE as u64) as usize;
                unsafe {
                    let ptr: *mut WireValue<Self> = list.ptr.add(offset) as *mut _;
                    (*ptr).set(value);
                }
            }

            fn element_size() -> ElementSize {
                ElementSize::$size
            }
        }
    };
}

primitive_element_impl!(u8, Byte);
primitive_element_impl!(i8, Byte);
primitive_element_impl!(u16, TwoBytes);
primitive_element_impl!(i16, TwoBytes);
primitive_element_impl!(u32, FourBytes);
primitive_element_impl!(i32, FourBytes);
primitive_element_impl!(u64, EightBytes);
primitive_element_impl!(i64, EightBytes);
primitive_element_impl!(f32, FourBytes);
primitive_element_impl!(f64, EightBytes);

impl PrimitiveElement for bool {
    #[inline]
    fn get(list: &ListReader, index: ElementCount32) -> Self {
        let bindex = u64::from(index) * u64::from(list.step);
        unsafe {
            let b: *const u8 = list.ptr.add((bindex / BITS_PER_BYTE as u64) as usize);
            ((*b) & (1 << (bindex % BITS_PER_BYTE as u64))) != 0
        }
    }

    #[inline]
    fn get_from_builder(list: &ListBuilder, index: ElementCount32) -> Self {
        let bindex = u64::from(index) * u64::from(list.step);
        let b = unsafe { list.ptr.add((bindex / BITS_PER_BYTE as u64) as usize) };
        unsafe { ((*b) & (1 << (bindex % BITS_PER_BYTE as u64))) != 0 }
    }

    #[inline]
    fn set(list: &ListBuilder, index: ElementCount32, value: Self) {
        let bindex = u64::from(index) * u64::from(list.step);
        let b = unsafe { list.ptr.add((bindex / BITS_PER_BYTE as u64) as usize) };
        let bitnum = bindex % BITS_PER_BYTE as u64;
        unsafe { (*b) = ((*b) & !(1 << bitnum)) | (u8::from(value) << bitnum) }
    }

    fn element_size() -> ElementSize {
        Bit
    }
}

impl PrimitiveElement for () {
    #[inline]
    fn get(_list: &ListReader, _index: ElementCount32) {}

    #[inline]
    fn get_from_builder(_list: &ListBuilder, _index: ElementCount32) {}

    #[inline]
    fn set(_list: &ListBuilder, _index: ElementCount32, _value: ()) {}

    fn element_size() -> ElementSize {
        Void
    }
}
