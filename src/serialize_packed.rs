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

//! The packed stream codec: a run-length encoding over 8-byte words that
//! collapses the zero words which dominate real messages.
//!
//! Each word is preceded by a tag byte whose bit `i` says whether byte `i`
//! is nonzero; only the nonzero bytes follow. An all-zero word (tag 0x00)
//! is followed by a count of further all-zero words, and an all-nonzero
//! word (tag 0xff) by a count of following words that are stored verbatim
//! because they would not compress (fewer than two zero bytes each).

use crate::io::{BufRead, Read, Write};
use crate::message;
use crate::serialize;
use crate::{Error, ErrorKind, Result};

/// A reader that unpacks a packed stream.
///
/// Reads must be multiples of 8 bytes. Calls made by [`read_message`] and
/// [`try_read_message`] mirror the writes of [`write_message`], so they
/// always satisfy this.
struct PackedRead<R>
where
    R: BufRead,
{
    inner: R,
}

impl<R> PackedRead<R>
where
    R: BufRead,
{
    /// Reads the next byte of the packed stream, refilling the underlying
    /// buffer as needed.
    fn read_packed_byte(&mut self) -> Result<u8> {
        let buf = self.inner.fill_buf()?;
        match buf.first() {
            Some(&b) => {
                self.inner.consume(1);
                Ok(b)
            }
            None => Err(Error::from_kind(ErrorKind::PrematureEndOfPackedInput)),
        }
    }

    /// Copies `out.len()` verbatim bytes out of the packed stream,
    /// spanning buffer refills as needed.
    fn read_packed_run(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let buf = self.inner.fill_buf()?;
            if buf.is_empty() {
                return Err(Error::from_kind(ErrorKind::PrematureEndOfPackedInput));
            }
            let n = buf.len().min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&buf[..n]);
            self.inner.consume(n);
            filled += n;
        }
        Ok(())
    }
}

impl<R> Read for PackedRead<R>
where
    R: BufRead,
{
    fn read(&mut self, out_buf: &mut [u8]) -> Result<usize> {
        let len = out_buf.len();
        if len == 0 {
            return Ok(0);
        }

        assert!(len % 8 == 0, "packed reads must be word-aligned");

        // A clean end-of-stream before the first word is not an error;
        // the caller may be probing for another message.
        if self.inner.fill_buf()?.is_empty() {
            return Ok(0);
        }

        let mut out = 0;
        while out < len {
            let tag = self.read_packed_byte()?;

            for i in 0..8 {
                if (tag & (1u8 << i)) != 0 {
                    out_buf[out] = self.read_packed_byte()?;
                } else {
                    out_buf[out] = 0;
                }
                out += 1;
            }

            if tag == 0 {
                let run_words = self.read_packed_byte()? as usize;
                let run = run_words * 8;
                if run > len - out {
                    return Err(Error::from_kind(ErrorKind::PackedRunTooLong));
                }
                out_buf[out..out + run].fill(0);
                out += run;
            } else if tag == 0xff {
                let run_words = self.read_packed_byte()? as usize;
                let run = run_words * 8;
                if run > len - out {
                    return Err(Error::from_kind(ErrorKind::PackedRunTooLong));
                }
                self.read_packed_run(&mut out_buf[out..out + run])?;
                out += run;
            }
        }

        Ok(len)
    }
}

/// Reads a packed message from a stream.
pub fn read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<message::Reader<serialize::OwnedSegments>>
where
    R: BufRead,
{
    let packed_read = PackedRead { inner: read };
    serialize::read_message(packed_read, options)
}

/// Like [`read_message`], but returns `None` on a clean end-of-stream.
pub fn try_read_message<R>(
    read: R,
    options: message::ReaderOptions,
) -> Result<Option<message::Reader<serialize::OwnedSegments>>>
where
    R: BufRead,
{
    let packed_read = PackedRead { inner: read };
    serialize::try_read_message(packed_read, options)
}

/// A writer that packs each `write_all`. Input must be word-aligned.
struct PackedWrite<W>
where
    W: Write,
{
    inner: W,
}

impl<W> Write for PackedWrite<W>
where
    W: Write,
{
    fn write_all(&mut self, in_buf: &[u8]) -> Result<()> {
        assert!(
            in_buf.len() % 8 == 0,
            "packed writes must be word-aligned"
        );

        // Staging buffer for packed output. A word packs to at most 10
        // bytes (tag + 8 bytes + run count), so flush when fewer remain.
        let mut buf: [u8; 64] = [0; 64];
        let mut buf_idx: usize = 0;

        let mut i = 0;
        while i < in_buf.len() {
            if buf_idx + 10 > buf.len() {
                self.inner.write_all(&buf[..buf_idx])?;
                buf_idx = 0;
            }

            let word = &in_buf[i..i + 8];
            i += 8;

            let tag_pos = buf_idx;
            buf_idx += 1;

            let mut tag: u8 = 0;
            for (n, &byte) in word.iter().enumerate() {
                if byte != 0 {
                    tag |= 1 << n;
                    buf[buf_idx] = byte;
                    buf_idx += 1;
                }
            }
            buf[tag_pos] = tag;

            if tag == 0 {
                // Count further all-zero words, to a one-byte maximum.
                let mut count: u8 = 0;
                while count < 255 && i < in_buf.len() && in_buf[i..i + 8] == [0u8; 8] {
                    count += 1;
                    i += 8;
                }
                buf[buf_idx] = count;
                buf_idx += 1;
            } else if tag == 0xff {
                // Count following words with fewer than two zero bytes;
                // those are a net loss to pack, so they pass through
                // verbatim. Two zeros is the break-even point.
                let run_start = i;
                let mut count: usize = 0;
                while count < 255 && i < in_buf.len() {
                    let zeros = in_buf[i..i + 8].iter().filter(|&&b| b == 0).count();
                    if zeros >= 2 {
                        break;
                    }
                    count += 1;
                    i += 8;
                }
                buf[buf_idx] = count as u8;
                buf_idx += 1;

                self.inner.write_all(&buf[..buf_idx])?;
                buf_idx = 0;
                self.inner.write_all(&in_buf[run_start..run_start + count * 8])?;
            }
        }

        self.inner.write_all(&buf[..buf_idx])
    }
}

/// Writes a packed message to a stream.
///
/// Errors originate exclusively from the writer.
pub fn write_message<W, A>(write: W, message: &message::Builder<A>) -> Result<()>
where
    W: Write,
    A: message::Allocator,
{
    let packed_write = PackedWrite { inner: write };
    serialize::write_message(packed_write, message)
}

#[cfg(test)]
mod tests {
    use quickcheck::{quickcheck, TestResult};

    use super::{read_message, PackedRead, PackedWrite};
    use crate::io::{Read, Write};
    use crate::message::ReaderOptions;
    use crate::serialize::test::write_message_segments;
    use crate::ErrorKind;

    #[test]
    fn premature_eof() {
        let input_bytes: &[u8] = &[];
        let mut packed_read = PackedRead { inner: input_bytes };

        let mut output_bytes: Vec<u8> = vec![0; 8];
        assert!(packed_read.read_exact(&mut output_bytes[..]).is_err());
    }

    pub fn check_unpacks_to(packed: &[u8], unpacked: &[u8]) {
        let mut packed_read = PackedRead { inner: packed };

        let mut bytes: Vec<u8> = vec![0; unpacked.len()];
        packed_read.read_exact(&mut bytes[..]).unwrap();

        assert!(packed_read.inner.is_empty()); // all input consumed
        assert_eq!(bytes, unpacked);
    }

    pub fn check_packing(unpacked: &[u8], packed: &[u8]) {
        // write
        let mut bytes: Vec<u8> = Vec::new();
        {
            let mut packed_write = PackedWrite { inner: &mut bytes };
            packed_write.write_all(unpacked).unwrap();
        }
        assert_eq!(bytes, packed);

        // read
        check_unpacks_to(packed, unpacked);
    }

    #[test]
    fn simple_packing() {
        check_packing(&[], &[]);
        check_packing(&[0; 8], &[0, 0]);
        check_packing(&[0, 0, 12, 0, 0, 34, 0, 0], &[0x24, 12, 34]);
        check_packing(
            &[1, 3, 2, 4, 5, 7, 6, 8],
            &[0xff, 1, 3, 2, 4, 5, 7, 6, 8, 0],
        );
        check_packing(
            &[0, 0, 0, 0, 0, 0, 0, 0, 1, 3, 2, 4, 5, 7, 6, 8],
            &[0, 0, 0xff, 1, 3, 2, 4, 5, 7, 6, 8, 0],
        );
        check_packing(
            &[0, 0, 12, 0, 0, 34, 0, 0, 1, 3, 2, 4, 5, 7, 6, 8],
            &[0x24, 12, 34, 0xff, 1, 3, 2, 4, 5, 7, 6, 8, 0],
        );
        check_packing(
            &[1, 3, 2, 4, 5, 7, 6, 8, 8, 6, 7, 4, 5, 2, 3, 1],
            &[0xff, 1, 3, 2, 4, 5, 7, 6, 8, 1, 8, 6, 7, 4, 5, 2, 3, 1],
        );

        check_packing(
            &[
                1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3,
                4, 5, 6, 7, 8, 0, 2, 4, 0, 9, 0, 5, 1,
            ],
            &[
                0xff, 1, 2, 3, 4, 5, 6, 7, 8, 3, 1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8,
                1, 2, 3, 4, 5, 6, 7, 8, 0xd6, 2, 4, 9, 5, 1,
            ],
        );
        check_packing(
            &[
                1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8, 6, 2, 4, 3, 9, 0, 5, 1, 1, 2, 3,
                4, 5, 6, 7, 8, 0, 2, 4, 0, 9, 0, 5, 1,
            ],
            &[
                0xff, 1, 2, 3, 4, 5, 6, 7, 8, 3, 1, 2, 3, 4, 5, 6, 7, 8, 6, 2, 4, 3, 9, 0, 5, 1,
                1, 2, 3, 4, 5, 6, 7, 8, 0xd6, 2, 4, 9, 5, 1,
            ],
        );

        check_packing(
            &[
                8, 0, 100, 6, 0, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 2, 0, 3, 1,
            ],
            &[0xed, 8, 100, 6, 1, 1, 2, 0, 2, 0xd4, 1, 2, 3, 1],
        );

        check_packing(&[0; 16], &[0, 1]);
        check_packing(
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 2],
        );
    }

    #[test]
    fn zero_runs_split_at_255_words() {
        // 300 zero words need two runs: 1+255 words, then 1+43.
        let mut unpacked = vec![0u8; 300 * 8];
        let mut expected: Vec<u8> = vec![0, 255, 0, 43];

        // Ten all-nonzero words: tag 0xff, the word, then 9 verbatim.
        unpacked.extend_from_slice(&[0xff; 10 * 8]);
        expected.extend_from_slice(&[0xff; 9]);
        expected.push(9);
        expected.extend_from_slice(&[0xff; 9 * 8]);

        // A mostly-zero trailer.
        unpacked.extend_from_slice(&[0, 0x11, 0, 0x22, 0, 0, 0, 0]);
        expected.extend_from_slice(&[0x0a, 0x11, 0x22]);

        check_packing(&unpacked, &expected);
    }

    quickcheck! {
        fn round_trip(segments: Vec<Vec<crate::Word>>) -> TestResult {
            use crate::message::ReaderSegments;
            if segments.is_empty() {
                return TestResult::discard();
            }
            let mut buf: Vec<u8> = Vec::new();

            write_message_segments(&mut PackedWrite { inner: &mut buf }, &segments);
            let message = read_message(&mut &buf[..], ReaderOptions::new()).unwrap();
            let result_segments = message.into_segments();

            TestResult::from_bool(segments.iter().enumerate().all(|(i, segment)| {
                crate::Word::words_to_bytes(&segment[..])
                    == result_segments.get_segment(i as u32).unwrap()
            }))
        }

        fn unpacking_arbitrary_bytes_never_panics(packed: Vec<u8>) -> TestResult {
            let len = packed.len();
            let mut packed_read = PackedRead { inner: &packed[..] };

            let mut out_buffer: Vec<u8> = vec![0; len * 8];

            let _ = packed_read.read_exact(&mut out_buffer);
            TestResult::from_bool(true)
        }
    }

    #[test]
    fn run_overruns_requested_size() {
        let packed = &[0xff, 1, 2, 3, 4, 5, 6, 7, 8, 37, 1, 2];
        let mut packed_read = PackedRead { inner: &packed[..] };

        let mut bytes: Vec<u8> = vec![0; 200];
        match packed_read.read_exact(&mut bytes[..]) {
            Ok(_) => panic!("should have been an error"),
            Err(e) => {
                assert_eq!(e.kind, ErrorKind::PackedRunTooLong);
            }
        }
    }

    #[test]
    fn premature_end_of_packed_input() {
        fn helper(packed: &[u8]) {
            let mut packed_read = PackedRead { inner: packed };

            let mut bytes: Vec<u8> = vec![0; 200];
            match packed_read.read_exact(&mut bytes[..]) {
                Ok(_) => panic!("should have been an error"),
                Err(e) => {
                    assert_eq!(e.kind, ErrorKind::PrematureEndOfPackedInput);
                }
            }
        }

        helper(&[0xf0, 1, 2]);
        helper(&[0]);
        helper(&[0xff, 1, 2, 3, 4, 5, 6, 7, 8]);

        // Valid packed data that simply falls short of the requested
        // size.
        helper(&[1, 1]);
    }

    #[test]
    fn packed_segment_table() {
        let packed_buf = &[0x11, 4, 1, 0, 1, 0, 0];

        check_unpacks_to(
            packed_buf,
            &[
                4, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 0, 0, 0,
            ],
        );

        // The framing layer must not assume the segment table arrives one
        // word at a time.
        read_message(&mut &packed_buf[..], Default::default()).unwrap();
    }
}
