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

//! The traversal limiter.
//!
//! A malicious message can make many pointers converge on the same words so
//! that a small wire payload expands to an enormous traversal. The limiter
//! bounds the total number of words a reader will dereference over its
//! lifetime. It is a soft defense: the counter is not thread-safe, and
//! over- or under-counting by a few words is acceptable.

use crate::{Error, ErrorKind, Result};
use core::cell::Cell;

pub struct ReadLimiter {
    limit: Cell<usize>,
    error_on_limit_exceeded: bool,
}

impl ReadLimiter {
    pub fn new(limit: Option<usize>) -> Self {
        match limit {
            Some(value) => Self {
                limit: Cell::new(value),
                error_on_limit_exceeded: true,
            },
            None => Self {
                limit: Cell::new(usize::MAX),
                error_on_limit_exceeded: false,
            },
        }
    }

    /// Charges `amount` words against the budget.
    #[inline]
    pub fn can_read(&self, amount: usize) -> Result<()> {
        let current = self.limit.get();
        if amount > current && self.error_on_limit_exceeded {
            Err(Error::from_kind(ErrorKind::ReadLimitExceeded))
        } else {
            // The common case is current >= amount, taking a single branch.
            self.limit.set(current.wrapping_sub(amount));
            Ok(())
        }
    }

    /// Refunds `amount` words, for traversals that the caller is expected to
    /// repeat (e.g. sizing an object before copying it). The refund is
    /// dropped if it would wrap the counter.
    #[inline]
    pub fn unread(&self, amount: usize) {
        let current = self.limit.get();
        let restored = current.wrapping_add(amount);
        if restored > current {
            self.limit.set(restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReadLimiter;

    #[test]
    fn exhaustion_is_sticky() {
        let limiter = ReadLimiter::new(Some(4));
        assert!(limiter.can_read(3).is_ok());
        assert!(limiter.can_read(2).is_err());
        assert!(limiter.can_read(1).is_ok());
        assert!(limiter.can_read(1).is_err());
    }

    #[test]
    fn unlimited_never_errors() {
        let limiter = ReadLimiter::new(None);
        assert!(limiter.can_read(usize::MAX).is_ok());
        assert!(limiter.can_read(usize::MAX).is_ok());
    }

    #[test]
    fn unread_refunds_but_never_wraps() {
        let limiter = ReadLimiter::new(Some(4));
        assert!(limiter.can_read(4).is_ok());
        limiter.unread(2);
        // This refund would wrap the counter, so it is dropped.
        limiter.unread(usize::MAX);
        assert!(limiter.can_read(2).is_ok());
        assert!(limiter.can_read(1).is_err());
    }
}
