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

//! List of lists.

use core::marker::PhantomData;

use crate::internal::layout::{ElementSize, ListBuilder, ListReader, PointerBuilder, PointerReader};
use crate::traits::{FromPointerBuilder, FromPointerReader, IndexMove, ListIter, Owned};
use crate::Result;

#[derive(Clone, Copy)]
pub struct TypedOwned<T> {
    marker: PhantomData<T>,
}

impl<T> Owned for TypedOwned<T>
where
    T: Owned,
{
    type Reader<'a> = Reader<'a, T>;
    type Builder<'a> = Builder<'a, T>;
}

pub struct Reader<'a, T>
where
    T: Owned,
{
    marker: PhantomData<T>,
    reader: ListReader<'a>,
}

impl<'a, T: Owned> Clone for Reader<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: Owned> Copy for Reader<'a, T> {}

impl<'a, T: Owned> Reader<'a, T> {
    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(self, index: u32) -> Result<T::Reader<'a>> {
        assert!(index < self.len());
        FromPointerReader::get_from_pointer(&self.reader.get_pointer_element(index))
    }

    pub fn iter(self) -> ListIter<Self, Result<T::Reader<'a>>> {
        let l = self.len();
        ListIter::new(self, l)
    }
}

impl<'a, T: Owned> FromPointerReader<'a> for Reader<'a, T> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a, T>> {
        Ok(Reader {
            reader: reader.get_list(ElementSize::Pointer, None)?,
            marker: PhantomData,
        })
    }
}

impl<'a, T: Owned> IndexMove<u32, Result<T::Reader<'a>>> for Reader<'a, T> {
    fn index_move(&self, index: u32) -> Result<T::Reader<'a>> {
        self.get(index)
    }
}

pub struct Builder<'a, T>
where
    T: Owned,
{
    marker: PhantomData<T>,
    builder: ListBuilder<'a>,
}

impl<'a, T: Owned> Builder<'a, T> {
    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initializes element `index` as a list of `size` elements.
    pub fn init(&mut self, index: u32, size: u32) -> T::Builder<'_> {
        assert!(index < self.len());
        FromPointerBuilder::init_pointer(
            self.builder.reborrow().get_pointer_element(index),
            size,
        )
    }

    pub fn get(self, index: u32) -> Result<T::Builder<'a>> {
        assert!(index < self.len());
        FromPointerBuilder::get_from_pointer(self.builder.get_pointer_element(index))
    }

    pub fn set<V>(&mut self, index: u32, value: V) -> Result<()>
    where
        V: crate::traits::SetPointerBuilder,
    {
        assert!(index < self.len());
        crate::traits::SetPointerBuilder::set_pointer_builder(
            self.builder.reborrow().get_pointer_element(index),
            value,
        )
    }

    pub fn reborrow(&mut self) -> Builder<'_, T> {
        Builder {
            builder: self.builder.reborrow(),
            marker: PhantomData,
        }
    }

    pub fn into_reader(self) -> Reader<'a, T> {
        Reader {
            marker: PhantomData,
            reader: self.builder.into_reader(),
        }
    }
}

impl<'a, T: Owned> FromPointerBuilder<'a> for Builder<'a, T> {
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Builder<'a, T> {
        Builder {
            builder: builder.init_list(ElementSize::Pointer, size),
            marker: PhantomData,
        }
    }

    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a, T>> {
        Ok(Builder {
            builder: builder.get_list(ElementSize::Pointer, None)?,
            marker: PhantomData,
        })
    }
}

impl<'a, T: Owned> crate::traits::SetPointerBuilder for Reader<'a, T> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a, T>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}
