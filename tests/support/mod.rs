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

//! Hand-written equivalents of compiler-generated accessor types, used by
//! the integration tests.

#![allow(dead_code)]

/// struct Sample { id :UInt32; label :Text; counts :List(UInt16); }
pub mod sample {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::{primitive_list, text, Result};

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 1,
        pointers: 2,
        preferred_list_encoding: ElementSize::InlineComposite,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> flatwire::struct_list::IntoInternalStructReader<'a> for Reader<'a> {
        fn into_internal_struct_reader(self) -> StructReader<'a> {
            self.reader
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_id(&self) -> u32 {
            self.reader.get_data_field::<u32>(0)
        }

        pub fn get_label(&self) -> Result<text::Reader<'a>> {
            self.reader.get_pointer_field(0).get_text(None)
        }

        pub fn has_label(&self) -> bool {
            !self.reader.is_pointer_field_null(0)
        }

        pub fn get_counts(&self) -> Result<primitive_list::Reader<'a, u16>> {
            FromPointerReader::get_from_pointer(&self.reader.get_pointer_field(1))
        }

        pub fn has_counts(&self) -> bool {
            !self.reader.is_pointer_field_null(1)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_id(&self) -> u32 {
            self.builder.get_data_field::<u32>(0)
        }

        pub fn set_id(&mut self, value: u32) {
            self.builder.set_data_field::<u32>(0, value)
        }

        pub fn get_label(&mut self) -> Result<text::Builder<'_>> {
            self.builder.get_pointer_field_mut(0).get_text(None)
        }

        pub fn set_label(&mut self, value: text::Reader<'_>) {
            self.builder.get_pointer_field_mut(0).set_text(value)
        }

        pub fn init_label(&mut self, size: u32) -> text::Builder<'_> {
            self.builder.get_pointer_field_mut(0).init_text(size)
        }

        pub fn has_label(&self) -> bool {
            !self.builder.is_pointer_field_null(0)
        }

        pub fn init_counts(&mut self, size: u32) -> primitive_list::Builder<'_, u16> {
            FromPointerBuilder::init_pointer(self.builder.get_pointer_field_mut(1), size)
        }

        pub fn as_reader(&self) -> Reader<'_> {
            Reader {
                reader: self.builder.as_reader(),
            }
        }
    }
}

/// struct Pair { value :UInt64; name :Text; }
pub mod pair {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::{text, Result};

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 1,
        pointers: 1,
        preferred_list_encoding: ElementSize::InlineComposite,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_value(&self) -> u64 {
            self.reader.get_data_field::<u64>(0)
        }

        pub fn get_name(&self) -> Result<text::Reader<'a>> {
            self.reader.get_pointer_field(0).get_text(None)
        }

        pub fn has_name(&self) -> bool {
            !self.reader.is_pointer_field_null(0)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_value(&self) -> u64 {
            self.builder.get_data_field::<u64>(0)
        }

        pub fn set_value(&mut self, value: u64) {
            self.builder.set_data_field::<u64>(0, value)
        }

        pub fn get_name(&mut self) -> Result<text::Builder<'_>> {
            self.builder.get_pointer_field_mut(0).get_text(None)
        }

        pub fn set_name(&mut self, value: text::Reader<'_>) {
            self.builder.get_pointer_field_mut(0).set_text(value)
        }

        pub fn has_name(&self) -> bool {
            !self.builder.is_pointer_field_null(0)
        }
    }
}

/// The same Pair type, one schema revision later:
/// struct Pair { value :UInt64; name :Text; extra :UInt64; }
pub mod pair_wide {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::{text, Result};

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 2,
        pointers: 1,
        preferred_list_encoding: ElementSize::InlineComposite,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_value(&self) -> u64 {
            self.reader.get_data_field::<u64>(0)
        }

        pub fn get_extra(&self) -> u64 {
            self.reader.get_data_field::<u64>(1)
        }

        pub fn get_name(&self) -> Result<text::Reader<'a>> {
            self.reader.get_pointer_field(0).get_text(None)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_value(&self) -> u64 {
            self.builder.get_data_field::<u64>(0)
        }

        pub fn set_value(&mut self, value: u64) {
            self.builder.set_data_field::<u64>(0, value)
        }

        pub fn get_extra(&self) -> u64 {
            self.builder.get_data_field::<u64>(1)
        }

        pub fn set_extra(&mut self, value: u64) {
            self.builder.set_data_field::<u64>(1, value)
        }

        pub fn get_name(&mut self) -> Result<text::Builder<'_>> {
            self.builder.get_pointer_field_mut(0).get_text(None)
        }

        pub fn set_name(&mut self, value: text::Reader<'_>) {
            self.builder.get_pointer_field_mut(0).set_text(value)
        }
    }
}

/// struct Stamp { seconds :UInt64; } — fits in a primitive list.
pub mod stamp {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::Result;

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 1,
        pointers: 0,
        preferred_list_encoding: ElementSize::EightBytes,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_seconds(&self) -> u64 {
            self.reader.get_data_field::<u64>(0)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_seconds(&self) -> u64 {
            self.builder.get_data_field::<u64>(0)
        }

        pub fn set_seconds(&mut self, value: u64) {
            self.builder.set_data_field::<u64>(0, value)
        }
    }
}

/// Stamp, one revision later:
/// struct Stamp { seconds :UInt64; nanos :UInt32; }
pub mod stamp_precise {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::Result;

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 2,
        pointers: 0,
        preferred_list_encoding: ElementSize::InlineComposite,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_seconds(&self) -> u64 {
            self.reader.get_data_field::<u64>(0)
        }

        pub fn get_nanos(&self) -> u32 {
            self.reader.get_data_field::<u32>(2)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_seconds(&self) -> u64 {
            self.builder.get_data_field::<u64>(0)
        }

        pub fn set_seconds(&mut self, value: u64) {
            self.builder.set_data_field::<u64>(0, value)
        }

        pub fn get_nanos(&self) -> u32 {
            self.builder.get_data_field::<u32>(2)
        }

        pub fn set_nanos(&mut self, value: u32) {
            self.builder.set_data_field::<u32>(2, value)
        }
    }
}

/// struct Octet { value :UInt8; } — fits in a byte list.
pub mod octet {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::Result;

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 1,
        pointers: 0,
        preferred_list_encoding: ElementSize::Byte,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_value(&self) -> u8 {
            self.reader.get_data_field::<u8>(0)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn get_value(&self) -> u8 {
            self.builder.get_data_field::<u8>(0)
        }

        pub fn set_value(&mut self, value: u8) {
            self.builder.set_data_field::<u8>(0, value)
        }
    }
}

/// struct Node { next :Node; } — a linked list, for nesting tests.
pub mod node {
    use flatwire::internal::layout::{
        ElementSize, PointerBuilder, PointerReader, StructBuilder, StructReader, StructSize,
    };
    use flatwire::traits::{
        FromPointerBuilder, FromPointerReader, FromStructBuilder, FromStructReader, HasStructSize,
    };
    use flatwire::Result;

    pub const STRUCT_SIZE: StructSize = StructSize {
        data: 0,
        pointers: 1,
        preferred_list_encoding: ElementSize::Pointer,
    };

    #[derive(Copy, Clone)]
    pub struct Owned(());

    impl flatwire::traits::Owned for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    impl flatwire::traits::OwnedStruct for Owned {
        type Reader<'a> = Reader<'a>;
        type Builder<'a> = Builder<'a>;
    }

    #[derive(Copy, Clone)]
    pub struct Reader<'a> {
        reader: StructReader<'a>,
    }

    impl<'a> FromStructReader<'a> for Reader<'a> {
        fn new(reader: StructReader<'a>) -> Self {
            Self { reader }
        }
    }

    impl<'a> FromPointerReader<'a> for Reader<'a> {
        fn get_from_pointer(reader: &PointerReader<'a>) -> Result<Self> {
            Ok(Self {
                reader: reader.get_struct(None)?,
            })
        }
    }

    impl<'a> Reader<'a> {
        pub fn get_next(&self) -> Result<Reader<'a>> {
            FromPointerReader::get_from_pointer(&self.reader.get_pointer_field(0))
        }

        pub fn has_next(&self) -> bool {
            !self.reader.is_pointer_field_null(0)
        }
    }

    impl<'a> flatwire::traits::SetPointerBuilder for Reader<'a> {
        fn set_pointer_builder(mut pointer: PointerBuilder<'_>, value: Self) -> Result<()> {
            pointer.set_struct(&value.reader)
        }
    }

    pub struct Builder<'a> {
        builder: StructBuilder<'a>,
    }

    impl<'a> HasStructSize for Builder<'a> {
        fn struct_size() -> StructSize {
            STRUCT_SIZE
        }
    }

    impl<'a> FromStructBuilder<'a> for Builder<'a> {
        fn new(builder: StructBuilder<'a>) -> Self {
            Self { builder }
        }
    }

    impl<'a> FromPointerBuilder<'a> for Builder<'a> {
        fn init_pointer(builder: PointerBuilder<'a>, _size: u32) -> Self {
            Self {
                builder: builder.init_struct(STRUCT_SIZE),
            }
        }

        fn get_from_pointer(builder: PointerBuilder<'a>) -> Result<Self> {
            Ok(Self {
                builder: builder.get_struct(STRUCT_SIZE, None)?,
            })
        }
    }

    impl<'a> Builder<'a> {
        pub fn init_next(self) -> Builder<'a> {
            FromPointerBuilder::init_pointer(self.builder.get_pointer_field(0), 0)
        }
    }
}
