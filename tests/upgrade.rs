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

//! In-place upgrades: opening old data through a newer schema must
//! preserve every field the old schema wrote.

mod support;

use flatwire::message::ReaderOptions;
use flatwire::{message, serialize};

use support::{octet, stamp, stamp_precise};

#[test]
fn struct_upgrade_preserves_and_extends() {
    let mut builder = message::Builder::new_default();
    {
        let mut root: stamp::Builder = builder.init_root();
        root.set_seconds(42);
    }

    // Open the same message through the newer schema: the old field is
    // intact and the new one reads its default.
    {
        let mut root: stamp_precise::Builder = builder.get_root().unwrap();
        assert_eq!(root.get_seconds(), 42);
        assert_eq!(root.get_nanos(), 0);
        root.set_nanos(123_456_789);
    }

    let bytes = serialize::write_message_to_words(&builder);

    // An old reader still sees its field; the extra word rides along.
    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    let old_root: stamp::Reader = reader.get_root().unwrap();
    assert_eq!(old_root.get_seconds(), 42);

    // A new reader sees both.
    let new_root: stamp_precise::Reader = reader.get_root().unwrap();
    assert_eq!(new_root.get_seconds(), 42);
    assert_eq!(new_root.get_nanos(), 123_456_789);
}

#[test]
fn struct_list_upgrades_from_primitive_encoding() {
    let mut builder = message::Builder::new_default();
    {
        // A list of single-u64 structs is laid out as a plain primitive
        // list.
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut list: flatwire::struct_list::Builder<stamp::Owned> = root.initn_as(3);
        for i in 0..3 {
            list.reborrow().get(i).set_seconds(100 + u64::from(i));
        }
    }

    // The wire encoding really is a primitive list: readable as u64s.
    {
        let root: flatwire::primitive_list::Reader<u64> =
            builder.get_root_as_reader().unwrap();
        assert_eq!(root.len(), 3);
        assert_eq!(root.get(0), 100);
        assert_eq!(root.get(2), 102);
    }

    // Opening through the newer element type forces an in-place upgrade
    // to the tagged inline-composite encoding.
    {
        let mut list: flatwire::struct_list::Builder<stamp_precise::Owned> =
            builder.get_root().unwrap();
        assert_eq!(list.len(), 3);
        for i in 0..3 {
            let mut element = list.reborrow().get(i);
            assert_eq!(element.get_seconds(), 100 + u64::from(i));
            assert_eq!(element.get_nanos(), 0);
            element.set_nanos(u32::from(i) + 1);
        }
    }

    let bytes = serialize::write_message_to_words(&builder);
    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();

    // Both schema versions read the upgraded list.
    let old_list: flatwire::struct_list::Reader<stamp::Owned> = reader.get_root().unwrap();
    assert_eq!(old_list.len(), 3);
    for i in 0..3 {
        assert_eq!(old_list.get(i).get_seconds(), 100 + u64::from(i));
    }

    let new_list: flatwire::struct_list::Reader<stamp_precise::Owned> =
        reader.get_root().unwrap();
    for i in 0..3 {
        assert_eq!(new_list.get(i).get_seconds(), 100 + u64::from(i));
        assert_eq!(new_list.get(i).get_nanos(), i + 1);
    }
}

#[test]
fn bit_list_widens_to_byte_structs() {
    let mut builder = message::Builder::new_default();
    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut bits: flatwire::primitive_list::Builder<bool> = root.initn_as(5);
        bits.set(0, true);
        bits.set(2, true);
        bits.set(4, true);
    }

    // Opening the bit list as a list of byte-sized structs widens each
    // bit to a byte.
    {
        let mut list: flatwire::struct_list::Builder<octet::Owned> =
            builder.get_root().unwrap();
        assert_eq!(list.len(), 5);
        for (i, expected) in [1u8, 0, 1, 0, 1].iter().enumerate() {
            assert_eq!(list.reborrow().get(i as u32).get_value(), *expected);
        }
    }

    // The upgraded list reads back as bytes.
    let bytes: flatwire::primitive_list::Reader<u8> = builder.get_root_as_reader().unwrap();
    assert_eq!(bytes.len(), 5);
    assert_eq!(bytes.get(0), 1);
    assert_eq!(bytes.get(1), 0);
    assert_eq!(bytes.get(2), 1);
}

#[test]
fn primitive_list_serves_smaller_element_views() {
    use flatwire::message::ValidationMode;

    let mut builder = message::Builder::new_default();
    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut list: flatwire::primitive_list::Builder<u32> = root.initn_as(3);
        list.set(0, 0x0102_0304);
        list.set(1, 5);
        list.set(2, 6);
    }

    // A u32 list satisfies a reader expecting u16 elements (each element's
    // low bytes line up), but not one expecting u64: that read degrades to
    // an empty default and records the mismatch.
    let reader = builder.into_reader();
    let as_u16: flatwire::primitive_list::Reader<u16> = reader.get_root().unwrap();
    assert_eq!(as_u16.len(), 3);
    assert_eq!(as_u16.get(0), 0x0304);

    let as_u64: flatwire::primitive_list::Reader<u64> = reader.get_root().unwrap();
    assert_eq!(as_u64.len(), 0);
    assert_eq!(
        reader.validation_error().unwrap().kind,
        flatwire::ErrorKind::IncompatibleListElement
    );

    // A strict reader rejects the mismatched view outright.
    let builder = reader.into_segments();
    let mut options = ReaderOptions::new();
    options
        .traversal_limit_in_words(None)
        .validation_mode(ValidationMode::Strict);
    let reader = message::Reader::new(builder, options);
    let as_u64: flatwire::Result<flatwire::primitive_list::Reader<u64>> = reader.get_root();
    assert_eq!(
        as_u64.unwrap_err().kind,
        flatwire::ErrorKind::IncompatibleListElement
    );
}

#[test]
fn rewriting_text_reuses_or_reallocates_cleanly() {
    use support::pair;

    let mut builder = message::Builder::new_default();
    {
        let mut root: pair::Builder = builder.init_root();
        root.set_value(1);
        root.set_name("first".into());
        // Overwriting a pointer field zeroes the old object before the
        // new allocation.
        root.set_name("second!".into());
        assert_eq!(root.get_name().unwrap().as_bytes(), b"second!");
    }

    let bytes = serialize::write_message_to_words(&builder);
    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    let root: pair::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_name().unwrap().as_bytes(), b"second!");

    // The first string's storage was zeroed when it was replaced.
    let mut zero_words = 0;
    for word in bytes.chunks_exact(8) {
        if word == [0; 8] {
            zero_words += 1;
        }
    }
    assert!(zero_words >= 1);
}
