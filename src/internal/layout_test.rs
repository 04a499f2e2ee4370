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

#![allow(clippy::bool_assert_comparison)]

use crate::internal::layout::{ElementSize, PointerReader};

fn root_over(words: &[crate::Word]) -> PointerReader<'_> {
    unsafe { PointerReader::get_root_unchecked(words.as_ptr() as *const u8) }
}

#[test]
fn simple_raw_data_struct() {
    let data: &[crate::Word] = &[
        crate::word(0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
        crate::word(0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef),
    ];

    let reader = root_over(data).get_struct(None).unwrap();

    assert_eq!(0xefcdab8967452301u64, reader.get_data_field::<u64>(0));
    assert_eq!(0, reader.get_data_field::<u64>(1)); // past end of struct -> default

    assert_eq!(0x67452301u32, reader.get_data_field::<u32>(0));
    assert_eq!(0xefcdab89u32, reader.get_data_field::<u32>(1));
    assert_eq!(0, reader.get_data_field::<u32>(2)); // past end of struct -> default

    assert_eq!(0x2301u16, reader.get_data_field::<u16>(0));
    assert_eq!(0x6745u16, reader.get_data_field::<u16>(1));
    assert_eq!(0xab89u16, reader.get_data_field::<u16>(2));
    assert_eq!(0xefcdu16, reader.get_data_field::<u16>(3));
    assert_eq!(0u16, reader.get_data_field::<u16>(4)); // past end of struct -> default

    assert_eq!(reader.get_bool_field(0), true);
    assert_eq!(reader.get_bool_field(1), false);
    assert_eq!(reader.get_bool_field(2), false);
    assert_eq!(reader.get_bool_field(3), false);
    assert_eq!(reader.get_bool_field(4), false);
    assert_eq!(reader.get_bool_field(5), false);
    assert_eq!(reader.get_bool_field(6), false);
    assert_eq!(reader.get_bool_field(7), false);

    assert_eq!(reader.get_bool_field(8), true);
    assert_eq!(reader.get_bool_field(9), true);
    assert_eq!(reader.get_bool_field(10), false);
    assert_eq!(reader.get_bool_field(11), false);
    assert_eq!(reader.get_bool_field(12), false);
    assert_eq!(reader.get_bool_field(13), true);
    assert_eq!(reader.get_bool_field(14), false);
    assert_eq!(reader.get_bool_field(15), false);

    assert_eq!(reader.get_bool_field(63), true);
    assert_eq!(reader.get_bool_field(64), false); // past end of struct -> default
}

const BOOL_LIST: &[crate::Word] = &[
    // list of 10 bits: [true, false, true, false, true, true, true,
    // false, false, true]
    crate::word(0x01, 0x00, 0x00, 0x00, 0x51, 0x00, 0x00, 0x00),
    crate::word(0x75, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
];

const BOOL_LIST_VALUES: [bool; 10] = [
    true, false, true, false, true, true, true, false, false, true,
];

#[test]
fn bool_list() {
    use crate::internal::layout::PrimitiveElement;
    use crate::traits::FromPointerReader;

    let reader = root_over(BOOL_LIST)
        .get_list(ElementSize::Bit, None)
        .unwrap();

    assert_eq!(reader.len(), 10);
    for (i, expected) in BOOL_LIST_VALUES.iter().enumerate() {
        assert_eq!(bool::get(&reader, i as u32), *expected);
    }

    let reader =
        crate::primitive_list::Reader::<bool>::get_from_pointer(&root_over(BOOL_LIST)).unwrap();

    assert_eq!(reader.len(), 10);
    for (i, expected) in BOOL_LIST_VALUES.iter().enumerate() {
        assert_eq!(reader.get(i as u32), *expected);
    }
}

#[test]
fn bool_list_as_struct_list() {
    // Every element of a bit list is also readable as a single-bit
    // struct: bool field 0 resolves through the element's bit position.
    let reader = root_over(BOOL_LIST)
        .get_list(ElementSize::InlineComposite, None)
        .unwrap();

    assert_eq!(reader.len(), 10);
    for (i, expected) in BOOL_LIST_VALUES.iter().enumerate() {
        let element = reader.get_struct_element(i as u32);
        assert_eq!(element.get_bool_field(0), *expected);
        // Field 1 lies outside the 1-bit data section.
        assert_eq!(element.get_bool_field(1), false);
    }
}

#[test]
fn struct_size() {
    let data: &[crate::Word] = &[
        crate::word(0x00, 0x00, 0x00, 0x00, 0x2, 0x00, 0x01, 0x00),
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];

    assert_eq!(root_over(data).total_size().unwrap().word_count, 3);
}

#[test]
fn struct_list_size() {
    let data: &[crate::Word] = &[
        crate::word(0x01, 0, 0, 0, 0x1f, 0, 0, 0), // inline composite, 4 words
        crate::word(0x4, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00), // 1 element, 1 data word
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
        crate::word(0x0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];

    // The list pointer claims four words but the tag says one element of
    // one word. total_size() reports the tag-derived value, since that is
    // what a copy would occupy.
    assert_eq!(root_over(data).total_size().unwrap().word_count, 2);
}

#[test]
fn empty_struct_list_size() {
    let data: &[crate::Word] = &[
        // Struct with one pointer.
        crate::word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00),
        // Inline-composite list, zero words long.
        crate::word(0x01, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00),
        // Tag.
        crate::word(0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00),
    ];

    assert_eq!(2, root_over(data).total_size().unwrap().word_count);
}

#[test]
fn reserved_pointer_kind_is_rejected() {
    use crate::internal::layout::ObjectReader;
    use crate::ErrorKind;

    let data: &[crate::Word] = &[crate::word(0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00)];

    let err = root_over(data).get_struct(None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExpectedStructPointer);

    let err = match root_over(data).get_object(None) {
        Ok(ObjectReader::Null) | Ok(ObjectReader::Struct(_)) | Ok(ObjectReader::List(_)) => {
            panic!("reserved pointer should not read as an object")
        }
        Err(e) => e,
    };
    assert_eq!(err.kind, ErrorKind::UnknownPointerKind);
}

#[test]
fn primitive_list_as_struct_list() {
    // A list of u16 read as a struct list: each element is a struct whose
    // data section is the element's two bytes.
    let data: &[crate::Word] = &[
        // List of 3 two-byte elements: upper32 = (3 << 3) | 3.
        crate::word(0x01, 0x00, 0x00, 0x00, 0x1b, 0x00, 0x00, 0x00),
        crate::word(0x0a, 0x00, 0x14, 0x00, 0x1e, 0x00, 0x00, 0x00),
    ];

    let reader = root_over(data)
        .get_list(ElementSize::InlineComposite, None)
        .unwrap();
    assert_eq!(reader.len(), 3);
    assert_eq!(reader.get_struct_element(0).get_data_field::<u16>(0), 10);
    assert_eq!(reader.get_struct_element(1).get_data_field::<u16>(0), 20);
    assert_eq!(reader.get_struct_element(2).get_data_field::<u16>(0), 30);
    // Fields beyond the two-byte data section read as default.
    assert_eq!(reader.get_struct_element(0).get_data_field::<u32>(0), 0);
}
