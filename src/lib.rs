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

//! Runtime library for a zero-copy, segment-based binary message format.
//!
//! A message is a tree of structs and lists laid out in 64-bit words across
//! one or more contiguous buffers called segments. Readers are typed views
//! directly onto those buffers; builders allocate words from a bump-allocated
//! arena and mutate them in place. No parse step ever runs: the wire bytes
//! *are* the in-memory representation.
//!
//! The crate is organized the same way data flows through it:
//!
//! * [`message`] owns the arena of segments and hands out root readers and
//!   builders.
//! * The layout engine in `internal::layout` resolves wire pointers, chases
//!   far pointers between segments, and enforces the bounds, traversal, and
//!   nesting checks that make reading untrusted bytes safe.
//! * [`serialize`] frames an arena as a byte stream (segment table followed
//!   by the segments) and parses such streams back.
//! * [`serialize_packed`] applies a zero-byte run-length compression to the
//!   framed stream.

pub mod any_pointer;
pub mod data;
pub mod data_list;
pub mod io;
pub mod list_list;
pub mod message;
pub mod primitive_list;
pub mod serialize;
pub mod serialize_packed;
pub mod struct_list;
pub mod text;
pub mod text_list;
pub mod traits;

/// Implementation details. Not intended for use by client code, but exposed
/// so that hand-written equivalents of generated code can reach the layout
/// primitives.
pub mod internal;

/// Eight bytes, the unit of all pointer arithmetic in a message.
///
/// The alignment of this type guarantees that buffers built from `Word`s can
/// be reinterpreted as segments.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Word {
    raw_content: [u8; 8],
}

/// Constructs a word from its bytes, in wire (little-endian) order.
pub const fn word(b0: u8, b1: u8, b2: u8, b3: u8, b4: u8, b5: u8, b6: u8, b7: u8) -> Word {
    Word {
        raw_content: [b0, b1, b2, b3, b4, b5, b6, b7],
    }
}

impl Word {
    /// Allocates a zeroed, 8-byte-aligned buffer of `length` words.
    pub fn allocate_zeroed_vec(length: usize) -> Vec<Word> {
        vec![word(0, 0, 0, 0, 0, 0, 0, 0); length]
    }

    pub fn words_to_bytes(words: &[Word]) -> &[u8] {
        unsafe { std::slice::from_raw_parts(words.as_ptr() as *const u8, words.len() * 8) }
    }

    pub fn words_to_bytes_mut(words: &mut [Word]) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, words.len() * 8) }
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Word {
    fn arbitrary(g: &mut quickcheck::Gen) -> Word {
        crate::word(
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
            u8::arbitrary(g),
        )
    }
}

/// Size of a message, as counted by `total_size()`.
///
/// Does not include far-pointer landing pads or the segment table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageSize {
    pub word_count: u64,
}

impl core::ops::AddAssign for MessageSize {
    fn add_assign(&mut self, rhs: Self) {
        self.word_count += rhs.word_count;
    }
}

/// Things that can go wrong when reading or writing a message.
///
/// Every variant except `Failed` corresponds to a specific validation
/// performed by the runtime; `Failed` carries free-form context in
/// [`Error::extra`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic failure. Details, if any, are in `Error::extra`.
    Failed,

    /// A struct or list pointer dereferenced to words outside its segment.
    PointerOutOfBounds,

    /// A far pointer named a segment that is not part of the message.
    InvalidSegmentId(u32),

    /// A segment buffer was not aligned to an 8-byte boundary.
    UnalignedSegment,

    /// The cumulative traversal limit was exhausted.
    ReadLimitExceeded,

    /// The nesting limit was exhausted; the message is too deeply nested or
    /// contains cycles.
    NestingLimitExceeded,

    /// A far pointer resolved to another far pointer where an object was
    /// expected.
    UnexpectedFarPointer,

    /// A pointer used the reserved kind (3).
    UnknownPointerKind,

    /// Non-struct pointer found where a struct pointer was expected.
    ExpectedStructPointer,

    /// Non-list pointer found where a list pointer was expected.
    ExpectedListPointer,

    /// Text must be encoded as a list of bytes.
    ExpectedTextList,

    /// Data must be encoded as a list of bytes.
    ExpectedDataList,

    /// Text blobs must end with a NUL byte, counted in the element count.
    TextMissingNulTerminator,

    /// An inline-composite list's tag word was not a struct descriptor.
    NonStructInlineComposite,

    /// An inline-composite list's elements overrun its declared word count.
    InlineCompositeOverrun,

    /// An existing list value is incompatible with the expected element
    /// size.
    IncompatibleListElement,

    /// Expected a bit list but found a list of structs.
    ExpectedBitList,

    /// Expected a primitive list but found pointer-only structs.
    ExpectedPrimitiveList,

    /// Expected a pointer list but found data-only structs.
    ExpectedPointerList,

    /// A stream or buffer contained no message at all.
    EmptyMessage,

    /// The segment table declared an unacceptable number of segments.
    InvalidSegmentCount(usize),

    /// The segment table declared more words than the traversal limit
    /// permits; refusing to allocate.
    MessageTooLarge(usize),

    /// The underlying stream ended in the middle of a message.
    PrematureEndOfFile,

    /// A flat buffer ended before the words its segment table declared.
    MessageTruncated { needed: usize, got: usize },

    /// The packed stream ended inside an encoded word or run.
    PrematureEndOfPackedInput,

    /// A packed zero or verbatim run overran the requested unpacked size.
    PackedRunTooLong,

    /// Attempted to follow a pointer inside a default-value blob out of
    /// that blob.
    ReadFromNullArena,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::PointerOutOfBounds => {
                write!(f, "message contains out-of-bounds pointer")
            }
            Self::InvalidSegmentId(id) => {
                write!(f, "invalid segment id {id}")
            }
            Self::UnalignedSegment => write!(
                f,
                "segment buffer is not aligned to an 8-byte boundary"
            ),
            Self::ReadLimitExceeded => write!(f, "read limit exceeded"),
            Self::NestingLimitExceeded => write!(
                f,
                "message is too deeply nested or contains cycles"
            ),
            Self::UnexpectedFarPointer => write!(f, "unexpected far pointer"),
            Self::UnknownPointerKind => write!(f, "unknown pointer kind"),
            Self::ExpectedStructPointer => write!(
                f,
                "message contains non-struct pointer where struct pointer was expected"
            ),
            Self::ExpectedListPointer => write!(
                f,
                "message contains non-list pointer where list pointer was expected"
            ),
            Self::ExpectedTextList => write!(
                f,
                "message contains non-byte-list pointer where text was expected"
            ),
            Self::ExpectedDataList => write!(
                f,
                "message contains non-byte-list pointer where data was expected"
            ),
            Self::TextMissingNulTerminator => {
                write!(f, "message contains text that is not NUL-terminated")
            }
            Self::NonStructInlineComposite => write!(
                f,
                "inline-composite lists of non-struct type are not supported"
            ),
            Self::InlineCompositeOverrun => write!(
                f,
                "inline-composite list's elements overrun its word count"
            ),
            Self::IncompatibleListElement => write!(
                f,
                "existing list value is incompatible with the expected element type"
            ),
            Self::ExpectedBitList => {
                write!(f, "expected a bit list, but got a list of structs")
            }
            Self::ExpectedPrimitiveList => write!(
                f,
                "expected a primitive list, but got a list of pointer-only structs"
            ),
            Self::ExpectedPointerList => write!(
                f,
                "expected a pointer list, but got a list of data-only structs"
            ),
            Self::EmptyMessage => write!(f, "stream contains no message"),
            Self::InvalidSegmentCount(n) => {
                write!(f, "invalid segment count {n}")
            }
            Self::MessageTooLarge(words) => {
                write!(f, "message of {words} words exceeds the read limit")
            }
            Self::PrematureEndOfFile => write!(f, "premature end of file"),
            Self::MessageTruncated { needed, got } => write!(
                f,
                "message ends prematurely: header declared {needed} words, buffer holds {got}"
            ),
            Self::PrematureEndOfPackedInput => {
                write!(f, "premature end of packed input")
            }
            Self::PackedRunTooLong => write!(
                f,
                "packed input did not end cleanly on a word boundary"
            ),
            Self::ReadFromNullArena => write!(f, "tried to read from a null arena"),
        }
    }
}

/// An error that occurred while reading or writing a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub extra: String,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            extra: String::new(),
        }
    }

    pub fn failed(extra: String) -> Self {
        Self {
            kind: ErrorKind::Failed,
            extra,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.extra.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.extra)
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::failed(format!("io error: {err}"))
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(err: core::str::Utf8Error) -> Self {
        Self::failed(format!("invalid utf-8: {err}"))
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// The segments of a built message, borrowed for output.
///
/// Single-segment messages are by far the most common, so that case avoids
/// a heap allocation.
pub enum OutputSegments<'a> {
    SingleSegment([&'a [u8]; 1]),
    MultiSegment(Vec<&'a [u8]>),
}

impl<'a> core::ops::Deref for OutputSegments<'a> {
    type Target = [&'a [u8]];
    fn deref(&self) -> &[&'a [u8]] {
        match self {
            Self::SingleSegment(s) => s,
            Self::MultiSegment(v) => v,
        }
    }
}

impl<'s> message::ReaderSegments for OutputSegments<'s> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        self.get(id as usize).copied()
    }

    fn len(&self) -> usize {
        match self {
            Self::SingleSegment(_) => 1,
            Self::MultiSegment(v) => v.len(),
        }
    }
}
