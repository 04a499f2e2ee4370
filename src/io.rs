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

//! Stream traits consumed by the serialization layer.
//!
//! These mirror `std::io::{Read, BufRead, Write}` but return this crate's
//! error type, and `read` is required to handle `EINTR` internally. Blanket
//! impls adapt any std stream, so `&[u8]`, `Vec<u8>`, files, and buffered
//! wrappers all work directly.

use crate::{Error, ErrorKind, Result};

pub trait Read {
    /// Reads some bytes into `buf`, returning how many were read. Ok(0)
    /// means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf) {
                Ok(0) => break,
                Ok(n) => {
                    let tmp = buf;
                    buf = &mut tmp[n..];
                }
                Err(e) => return Err(e),
            }
        }
        if buf.is_empty() {
            Ok(())
        } else {
            Err(Error::from_kind(ErrorKind::PrematureEndOfFile))
        }
    }
}

/// A reader that exposes its internal buffer, enabling zero-copy paths.
pub trait BufRead: Read {
    fn fill_buf(&mut self) -> Result<&[u8]>;
    fn consume(&mut self, amt: usize);
}

pub trait Write {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;
}

impl<R: std::io::Read> Read for R {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match std::io::Read::read(self, buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: std::io::BufRead> BufRead for R {
    fn fill_buf(&mut self) -> Result<&[u8]> {
        Ok(std::io::BufRead::fill_buf(self)?)
    }

    fn consume(&mut self, amt: usize) {
        std::io::BufRead::consume(self, amt)
    }
}

impl<W: std::io::Write> Write for W {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        Ok(())
    }
}
