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

//! List of structs.
//!
//! Whether the elements are stored as an inline-composite list or as a
//! flat primitive list is decided by the struct's preferred list encoding;
//! either way the element accessors behave identically.

use core::marker::PhantomData;

use crate::internal::layout::{
    ElementSize, ListBuilder, ListReader, PointerBuilder, PointerReader,
};
use crate::traits::{
    FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    IndexMove, ListIter, OwnedStruct,
};
use crate::Result;

#[derive(Clone, Copy)]
pub struct Owned<T> {
    marker: PhantomData<T>,
}

impl<T> crate::traits::Owned for Owned<T>
where
    T: OwnedStruct,
{
    type Reader<'a> = Reader<'a, T>;
    type Builder<'a> = Builder<'a, T>;
}

pub struct Reader<'a, T>
where
    T: OwnedStruct,
{
    marker: PhantomData<T>,
    reader: ListReader<'a>,
}

impl<'a, T: OwnedStruct> Clone for Reader<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T: OwnedStruct> Copy for Reader<'a, T> {}

impl<'a, T: OwnedStruct> Reader<'a, T> {
    pub fn len(&self) -> u32 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(self, index: u32) -> T::Reader<'a> {
        assert!(index < self.len());
        FromStructReader::new(self.reader.get_struct_element(index))
    }

    pub fn iter(self) -> ListIter<Self, T::Reader<'a>> {
        let l = self.len();
        ListIter::new(self, l)
    }
}

impl<'a, T: OwnedStruct> FromPointerReader<'a> for Reader<'a, T> {
    fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Reader<'a, T>> {
        Ok(Reader {
            reader: reader.get_list(ElementSize::InlineComposite, None)?,
            marker: PhantomData,
        })
    }
}

impl<'a, T: OwnedStruct> IndexMove<u32, T::Reader<'a>> for Reader<'a, T> {
    fn index_move(&self, index: u32) -> T::Reader<'a> {
        self.get(index)
    }
}

impl<'a, T: OwnedStruct> IntoIterator for Reader<'a, T> {
    type Item = T::Reader<'a>;
    type IntoIter = ListIter<Reader<'a, T>, Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Builder<'a, T>
where
    T: OwnedStruct,
{
    marker: PhantomData<T>,
    builder: ListBuilder<'a>,
}

impl<'a, T: OwnedStruct> Builder<'a, T> {
    pub fn len(&self) -> u32 {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(self, index: u32) -> T::Builder<'a> {
        assert!(index < self.len());
        FromStructBuilder::new(self.builder.get_struct_element(index))
    }

    /// Copies `value` into element `index`. Pointer fields the element
    /// cannot hold (because the list was allocated with an older, smaller
    /// layout) are lost; data fields that do not fit are truncated.
    pub fn set_with_caveats(&mut self, index: u32, value: T::Reader<'_>) -> Result<()>
    where
        for<'b> T::Reader<'b>: IntoInternalStructReader<'b>,
    {
        assert!(index < self.len());
        let mut element = self.builder.reborrow().get_struct_element(index);
        element.copy_content_from(&value.into_internal_struct_reader())
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

/// Implemented by generated struct readers so that list elements can be
/// overwritten wholesale.
pub trait IntoInternalStructReader<'a> {
    fn into_internal_struct_reader(self) -> crate::internal::layout::StructReader<'a>;
}

impl<'a, T: OwnedStruct> FromPointerBuilder<'a> for Builder<'a, T> {
    fn init_pointer(builder: PointerBuilder<'a>, size: u32) -> Builder<'a, T> {
        Builder {
            builder: builder
                .init_struct_list(size, <T::Builder<'a> as HasStructSize>::struct_size()),
            marker: PhantomData,
        }
    }

    fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Builder<'a, T>> {
        Ok(Builder {
            builder: builder
                .get_struct_list(<T::Builder<'a> as HasStructSize>::struct_size(), None)?,
            marker: PhantomData,
        })
    }
}

impl<'a, T: OwnedStruct> crate::traits::SetPointerBuilder for Reader<'a, T> {
    fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Reader<'a, T>) -> Result<()> {
        pointer.set_list(&value.reader)
    }
}
