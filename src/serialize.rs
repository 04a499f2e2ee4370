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

//! Stream framing: a segment table followed by the segments.
//!
//! The wire layout of a framed message is:
//!
//! 1. A little-endian `u32` holding the segment count minus one.
//! 2. One little-endian `u32` per segment holding its size in words.
//! 3. One padding `u32` if needed to reach a word boundary.
//! 4. The segments themselves, tightly packed, in id order.

use crate::internal::units::BYTES_PER_WORD;
use crate::io::{Read, Write};
use crate::message;
use crate::{Error, ErrorKind, Result, Word};

use core::ops::Deref;

/// Refuse messages declaring this many segments or more. The limit bounds
/// the table allocation a malicious header can provoke.
pub const SEGMENT_COUNT_LIMIT: usize = 512;

/// The parsed segment table, held as prefix sums: `offsets[i]` is the word
/// index (relative to the end of the table) where segment `i` begins, and
/// the final entry is the total word count.
pub struct SegmentTable {
    offsets: Vec<usize>,
}

impl SegmentTable {
    pub fn with_capacity(segment_count: usize) -> Self {
        let mut offsets = Vec::with_capacity(segment_count + 1);
        offsets.push(0);
        Self { offsets }
    }

    /// Appends the length of the next segment.
    pub fn push_segment(&mut self, length_in_words: usize) {
        let end = self.total_words() + length_in_words;
        self.offsets.push(end);
    }

    /// Sum of all segment lengths pushed so far.
    pub fn total_words(&self) -> usize {
        *self.offsets.last().unwrap()
    }

    pub fn segment_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Allocates a single zeroed buffer big enough for all segments.
    pub fn into_owned_segments(self) -> OwnedSegments {
        let owned_space = Word::allocate_zeroed_vec(self.total_words());
        OwnedSegments {
            offsets: self.offsets,
            owned_space,
        }
    }

    /// Wraps a flat buffer that already holds the segments (preceded by
    /// the table they were parsed from).
    pub fn into_slice_segments(self, slice: &[u8], segment_table_bytes_len: usize) -> SliceSegments {
        debug_assert!(self.total_words() * BYTES_PER_WORD <= slice.len());
        BufferSegments {
            buffer: slice,
            segment_table_bytes_len,
            offsets: self.offsets,
        }
    }

    /// The raw prefix sums, primarily for tests.
    pub fn segment_offsets(self) -> Vec<usize> {
        self.offsets
    }
}

/// Segments borrowed from a single flat byte slice.
pub type SliceSegments<'a> = BufferSegments<&'a [u8]>;

/// Segments parsed out of a borrowed or owned flat buffer.
pub struct BufferSegments<T> {
    buffer: T,

    /// Length of the segment table at the front of `buffer`.
    segment_table_bytes_len: usize,

    /// Prefix-sum word offsets of the segments, relative to the end of
    /// the table.
    offsets: Vec<usize>,
}

impl<T: Deref<Target = [u8]>> BufferSegments<T> {
    /// Parses a segment table out of `buffer` and takes ownership. The
    /// buffer may be longer than the message it holds.
    pub fn new(buffer: T, options: message::ReaderOptions) -> Result<Self> {
        let mut bytes = &*buffer;

        let Some(table) = read_segment_table(&mut bytes, options)? else {
            return Err(Error::from_kind(ErrorKind::EmptyMessage));
        };
        let segment_table_bytes_len = buffer.len() - bytes.len();

        let available_words = (buffer.len() - segment_table_bytes_len) / BYTES_PER_WORD;
        if table.total_words() > available_words {
            return Err(Error::from_kind(ErrorKind::MessageTruncated {
                needed: table.total_words(),
                got: available_words,
            }));
        }
        Ok(Self {
            buffer,
            segment_table_bytes_len,
            offsets: table.offsets,
        })
    }

    pub fn into_buffer(self) -> T {
        self.buffer
    }
}

impl<T: Deref<Target = [u8]>> message::ReaderSegments for BufferSegments<T> {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let id = id as usize;
        if id + 1 >= self.offsets.len() {
            return None;
        }
        let start = self.segment_table_bytes_len + self.offsets[id] * BYTES_PER_WORD;
        let end = self.segment_table_bytes_len + self.offsets[id + 1] * BYTES_PER_WORD;
        Some(&self.buffer[start..end])
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }
}

/// A message's segments copied into one owned, word-aligned buffer.
pub struct OwnedSegments {
    /// Prefix-sum word offsets of the segments within `owned_space`.
    offsets: Vec<usize>,

    owned_space: Vec<Word>,
}

impl Deref for OwnedSegments {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        Word::words_to_bytes(&self.owned_space[..])
    }
}

impl core::ops::DerefMut for OwnedSegments {
    fn deref_mut(&mut self) -> &mut [u8] {
        Word::words_to_bytes_mut(&mut self.owned_space[..])
    }
}

impl message::ReaderSegments for OwnedSegments {
    fn get_segment(&self, id: u32) -> Option<&[u8]> {
        let id = id as usize;
        if id + 1 >= self.offsets.len() {
            return None;
        }
        Some(&self[self.offsets[id] * BYTES_PER_WORD..self.offsets[id + 1] * BYTES_PER_WORD])
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }
}

/// Reads a framed message from a flat byte slice without copying. The
/// slice may extend past the message; on success, `slice` is updated to
/// the remaining bytes.
///
/// The slice must be 8-byte aligned or subsequent reads will fail.
pub fn read_message_from_flat_slice<'a>(
    slice: &mut &'a [u8],
    options: message::ReaderOptions,
) -> Result<message::Reader<SliceSegments<'a>>> {
    let all_bytes = *slice;
    let mut bytes = *slice;
    let Some(table) = read_segment_table(&mut bytes, options)? else {
        return Err(Error::from_kind(ErrorKind::EmptyMessage));
    };
    let segment_table_bytes_len = all_bytes.len() - bytes.len();
    debug_assert_eq!(segment_table_bytes_len % BYTES_PER_WORD, 0);

    let body_bytes = &all_bytes[segment_table_bytes_len..];
    let num_words = table.total_words();
    if num_words > body_bytes.len() / BYTES_PER_WORD {
        return Err(Error::from_kind(ErrorKind::MessageTruncated {
            needed: num_words,
            got: body_bytes.len() / BYTES_PER_WORD,
        }));
    }

    *slice = &body_bytes[(num_words * BYTES_PER_WORD)..];
    Ok(message::Reader::new(
        table.into_slice_segments(all_bytes, segment_table_bytes_len),
        options,
    ))
}

/// Reads a framed message from a stream, copying the segments into owned
/// memory.
///
/// For best performance `read` should be buffered.
pub fn read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<message::Reader<OwnedSegments>>
where
    R: Read,
{
    match read_message_impl(read, options)? {
        Some(reader) => Ok(reader),
        None => Err(Error::from_kind(ErrorKind::PrematureEndOfFile)),
    }
}

/// Like [`read_message`], but returns `None` on a clean end-of-stream.
/// Useful for consuming a stream holding an unknown number of messages.
pub fn try_read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<OwnedSegments>>>
where
    R: Read,
{
    read_message_impl(read, options)
}

fn read_message_impl<R>(
    mut read: R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<OwnedSegments>>>
where
    R: Read,
{
    let Some(table) = read_segment_table(&mut read, options)? else {
        return Ok(None);
    };
    let mut segments = table.into_owned_segments();
    read.read_exact(&mut segments[..])?;
    Ok(Some(message::Reader::new(segments, options)))
}

/// Reads one word, returning `false` on a clean end-of-stream before the
/// first byte. A stream ending mid-word is an error.
fn read_leading_word<R: Read>(read: &mut R, buf: &mut [u8; 8]) -> Result<bool> {
    let n = read.read(&mut buf[..])?;
    if n == 0 {
        return Ok(false);
    }
    if n < buf.len() {
        read.read_exact(&mut buf[n..])?;
    }
    Ok(true)
}

/// Parses the segment table. Returns `None` if the stream ended cleanly
/// before the first byte.
fn read_segment_table<R>(
    read: &mut R,
    options: message::ReaderOptions,
) -> Result<Option<SegmentTable>>
where
    R: Read,
{
    // The first word holds the segment count and the first segment's
    // length.
    let mut first_word = [0u8; 8];
    if !read_leading_word(read, &mut first_word)? {
        return Ok(None);
    }

    let segment_count =
        u32::from_le_bytes(first_word[0..4].try_into().unwrap()).wrapping_add(1) as usize;
    if segment_count >= SEGMENT_COUNT_LIMIT || segment_count == 0 {
        return Err(Error::from_kind(ErrorKind::InvalidSegmentCount(
            segment_count,
        )));
    }

    let mut table = SegmentTable::with_capacity(segment_count);
    table.push_segment(u32::from_le_bytes(first_word[4..8].try_into().unwrap()) as usize);

    if segment_count > 1 {
        // The remaining lengths, plus a padding u32 when the total field
        // count is odd, always form whole words.
        let mut rest = vec![0u8; (segment_count & !1) * 4];
        read.read_exact(&mut rest[..])?;
        for length in rest.chunks_exact(4).take(segment_count - 1) {
            table.push_segment(u32::from_le_bytes(length.try_into().unwrap()) as usize);
        }
    }

    // Refuse a message the receiver could never traverse anyway. Without
    // this check a malicious header could provoke a huge allocation.
    if let Some(limit) = options.traversal_limit_in_words {
        if table.total_words() > limit {
            return Err(Error::from_kind(ErrorKind::MessageTooLarge(
                table.total_words(),
            )));
        }
    }

    Ok(Some(table))
}

/// Serializes the entire message into a flat byte vector, segment table
/// included.
pub fn write_message_to_words<A>(message: &message::Builder<A>) -> Vec<u8>
where
    A: message::Allocator,
{
    flatten_segments(&*message.get_segments_for_output())
}

/// Like [`write_message_to_words`], but for any `ReaderSegments` (e.g. a
/// `message::Reader` via `into_segments()`).
pub fn write_message_segments_to_words<R>(message: &R) -> Vec<u8>
where
    R: message::ReaderSegments,
{
    flatten_segments(message)
}

fn flatten_segments<R: message::ReaderSegments + ?Sized>(segments: &R) -> Vec<u8> {
    let mut result = Vec::with_capacity(compute_serialized_size(segments) * BYTES_PER_WORD);
    write_segment_table(&mut result, segments).expect("writing into a Vec cannot fail");
    for i in 0..segments.len() {
        result.extend_from_slice(segments.get_segment(i as u32).unwrap());
    }
    result
}

/// Writes the message to a stream.
///
/// For best performance `write` should be buffered; `flush()` is not
/// called. Errors originate exclusively from the writer.
pub fn write_message<W, A>(mut write: W, message: &message::Builder<A>) -> Result<()>
where
    W: Write,
    A: message::Allocator,
{
    let segments = message.get_segments_for_output();
    write_segment_table(&mut write, &segments)?;
    write_segments(&mut write, &segments)
}

/// Like [`write_message`], but for any `ReaderSegments`.
pub fn write_message_segments<W, R>(mut write: W, segments: &R) -> Result<()>
where
    W: Write,
    R: message::ReaderSegments,
{
    write_segment_table(&mut write, segments)?;
    write_segments(&mut write, segments)
}

/// Writes the segment table for `segments`, which must be non-empty.
fn write_segment_table<W, R>(write: &mut W, segments: &R) -> Result<()>
where
    W: Write,
    R: message::ReaderSegments + ?Sized,
{
    let segment_count = segments.len();
    let mut table = Vec::with_capacity((segment_count / 2 + 1) * BYTES_PER_WORD);

    table.extend_from_slice(&(segment_count as u32 - 1).to_le_bytes());
    for i in 0..segment_count {
        let segment_words = segments.get_segment(i as u32).unwrap().len() / BYTES_PER_WORD;
        table.extend_from_slice(&(segment_words as u32).to_le_bytes());
    }
    if segment_count % 2 == 0 {
        // Pad the header out to a whole word.
        table.extend_from_slice(&[0, 0, 0, 0]);
    }

    write.write_all(&table)
}

fn write_segments<W, R: message::ReaderSegments + ?Sized>(write: &mut W, segments: &R) -> Result<()>
where
    W: Write,
{
    for i in 0..segments.len() {
        write.write_all(segments.get_segment(i as u32).unwrap())?;
    }
    Ok(())
}

fn compute_serialized_size<R: message::ReaderSegments + ?Sized>(segments: &R) -> usize {
    // Table size...
    let len = segments.len();
    let mut size = (len / 2) + 1;
    // ...plus the segments.
    for i in 0..len {
        size += segments.get_segment(i as u32).unwrap().len() / BYTES_PER_WORD;
    }
    size
}

/// The number of words [`write_message`] would produce for this message,
/// segment table included. Multiply by 8 for the byte count.
pub fn compute_serialized_size_in_words<A>(message: &crate::message::Builder<A>) -> usize
where
    A: crate::message::Allocator,
{
    compute_serialized_size(&message.get_segments_for_output())
}
