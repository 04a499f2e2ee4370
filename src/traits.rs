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

//! The contract between the runtime and generated (or hand-written) typed
//! accessor code.

use crate::internal::layout::{
    PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
};
use crate::Result;

use core::marker::PhantomData;

/// Types that can be read out of a pointer field.
pub trait FromPointerReader<'a>: Sized {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self>;
}

/// Types that can be initialized in, or read back out of, a builder's
/// pointer field.
pub trait FromPointerBuilder<'a>: Sized {
    /// `length` is the element count for list types and ignored elsewhere.
    fn init_pointer(builder: PointerBuilder<'a>, length: u32) -> Self;
    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self>;
}

/// Values that can be deep-copied into a pointer field.
pub trait SetPointerBuilder {
    fn set_pointer_builder(pointer: PointerBuilder<'_>, value: Self) -> Result<()>
    where
        Self: Sized;
}

/// Associates a message type with its reader and builder views, so that the
/// type can be named without committing to a lifetime. If `Foo` is a
/// message type and `Bar` an ordinary Rust type, then `foo::Reader<'a>` is
/// to `foo::Owned` as `&'a Bar` is to `Bar`.
pub trait Owned {
    type Reader<'a>: FromPointerReader<'a> + SetPointerBuilder;
    type Builder<'a>: FromPointerBuilder<'a>;
}

/// Like [`Owned`], for struct types specifically: the views are built from
/// struct readers and builders, and the builder knows its wire size.
pub trait OwnedStruct {
    type Reader<'a>: FromStructReader<'a> + SetPointerBuilder;
    type Builder<'a>: FromStructBuilder<'a> + HasStructSize;
}

pub trait FromStructReader<'a> {
    fn new(reader: StructReader<'a>) -> Self;
}

pub trait FromStructBuilder<'a> {
    fn new(builder: StructBuilder<'a>) -> Self;
}

pub trait HasStructSize {
    fn struct_size() -> StructSize;
}

pub trait IndexMove<I, T> {
    fn index_move(&self, index: I) -> T;
}

pub struct ListIter<T, U> {
    marker: PhantomData<U>,
    list: T,
    index: u32,
    size: u32,
}

impl<T, U> ListIter<T, U> {
    pub fn new(list: T, size: u32) -> Self {
        Self {
            list,
            index: 0,
            size,
            marker: PhantomData,
        }
    }
}

impl<U, T: IndexMove<u32, U>> Iterator for ListIter<T, U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        if self.index < self.size {
            let result = self.list.index_move(self.index);
            self.index += 1;
            Some(result)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.size - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl<U, T: IndexMove<u32, U>> ExactSizeIterator for ListIter<T, U> {
    fn len(&self) -> usize {
        (self.size - self.index) as usize
    }
}

impl<U, T: IndexMove<u32, U>> DoubleEndedIterator for ListIter<T, U> {
    fn next_back(&mut self) -> Option<U> {
        if self.size > self.index {
            self.size -= 1;
            Some(self.list.index_move(self.size))
        } else {
            None
        }
    }
}
