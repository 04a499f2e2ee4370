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

//! End-to-end tests of building, framing, and reading messages.

mod support;

use flatwire::message::{AllocationStrategy, HeapAllocator, ReaderOptions};
use flatwire::{message, serialize, serialize_packed};

use support::{pair, pair_wide, sample};

#[test]
fn roundtrip_single_segment() {
    let mut builder = message::Builder::new_default();
    {
        let mut root: sample::Builder = builder.init_root();
        root.set_id(0xdead_beef);
        root.set_label("hello".into());
        let mut counts = root.init_counts(3);
        counts.set(0, 1);
        counts.set(1, 2);
        counts.set(2, 3);
    }

    let bytes = serialize::write_message_to_words(&builder);

    // One header word, the root pointer, three words of struct body, one
    // word of text ("hello\0"), one word of list (3 x u16).
    assert_eq!(bytes.len(), 7 * 8);

    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    assert!(slice.is_empty());

    let root: sample::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_id(), 0xdead_beef);
    assert!(root.has_label());
    assert_eq!(root.get_label().unwrap(), "hello");
    let counts = root.get_counts().unwrap();
    assert_eq!(counts.len(), 3);
    assert_eq!(
        counts.iter().collect::<Vec<u16>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn roundtrip_packed() {
    let mut builder = message::Builder::new_default();
    {
        let mut root: sample::Builder = builder.init_root();
        root.set_id(17);
        root.set_label("packed".into());
        let mut counts = root.init_counts(4);
        for i in 0..4 {
            counts.set(i, i as u16 * 1000);
        }
    }

    let mut packed: Vec<u8> = Vec::new();
    serialize_packed::write_message(&mut packed, &builder).unwrap();

    // The zero-heavy message must actually compress.
    assert!(packed.len() < serialize::write_message_to_words(&builder).len());

    let reader = serialize_packed::read_message(&packed[..], ReaderOptions::new()).unwrap();
    let root: sample::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_id(), 17);
    assert_eq!(root.get_label().unwrap(), "packed");
    let counts = root.get_counts().unwrap();
    assert_eq!(counts.len(), 4);
    for i in 0..4 {
        assert_eq!(counts.get(i), i as u16 * 1000);
    }
}

#[test]
fn forced_multi_segment() {
    // Eight-word segments force the texts out of the first segment, so
    // every list element becomes a far pointer.
    let allocator = HeapAllocator::new()
        .first_segment_words(8)
        .allocation_strategy(AllocationStrategy::FixedSize);
    let mut builder = message::Builder::new(allocator);

    let strings: Vec<String> = (0..4).map(|i| format!("{i:031}")).collect();
    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut list: flatwire::text_list::Builder = root.initn_as(4);
        for (i, s) in strings.iter().enumerate() {
            list.set(i as u32, s.as_str().into());
        }
    }

    let segments = builder.get_segments_for_output();
    assert!(segments.len() >= 5, "expected one segment per text");

    // Segment 0 holds the root pointer and the four list elements, each of
    // which must be a single (not double) far pointer.
    let segment0 = segments[0];
    for element in 1..5 {
        let first_byte = segment0[element * 8];
        assert_eq!(first_byte & 3, 2, "list element {element} should be a far pointer");
        assert_eq!(first_byte & 4, 0, "no double-far expected here");
    }
    drop(segments);

    let bytes = serialize::write_message_to_words(&builder);
    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    let root: flatwire::text_list::Reader = reader.get_root().unwrap();
    assert_eq!(root.len(), 4);
    for (i, s) in strings.iter().enumerate() {
        assert_eq!(root.get(i as u32).unwrap(), s.as_str());
    }
}

#[test]
fn double_far_through_full_segment() {
    // Fill segment 0 exactly: root pointer (1) + struct body (2) + text
    // (5 words, 40 bytes with the NUL). Upgrading the root then moves the
    // struct to a new segment, and transferring the text pointer cannot
    // put a landing pad in the full segment 0, forcing a double-far.
    let allocator = HeapAllocator::new()
        .first_segment_words(8)
        .allocation_strategy(AllocationStrategy::FixedSize);
    let mut builder = message::Builder::new(allocator);

    let name: String = "x".repeat(39);
    let name = name.as_str();
    {
        let mut root: pair::Builder = builder.init_root();
        root.set_value(42);
        root.set_name(name.into());
    }
    assert_eq!(builder.get_segments_for_output().len(), 1);
    assert_eq!(builder.get_segments_for_output()[0].len(), 8 * 8);

    {
        let mut root: pair_wide::Builder = builder.get_root().unwrap();
        assert_eq!(root.get_value(), 42);
        assert_eq!(root.get_extra(), 0);
        root.set_extra(7);
        assert_eq!(root.get_name().unwrap().as_bytes(), name.as_bytes());
    }

    let segments = builder.get_segments_for_output();
    assert!(segments.len() >= 2);

    // Hunt for the double-far pointer: kind bits 0b10 with the double
    // flag set.
    let mut double_fars = 0;
    let segment1 = segments[1];
    for word in segment1.chunks_exact(8) {
        if word[0] & 7 == 6 {
            double_fars += 1;
        }
    }
    assert_eq!(double_fars, 1);
    drop(segments);

    let bytes = serialize::write_message_to_words(&builder);
    let mut slice = &bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    let root: pair_wide::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_value(), 42);
    assert_eq!(root.get_extra(), 7);
    assert_eq!(root.get_name().unwrap().as_bytes(), name.as_bytes());
}

#[test]
fn reinitializing_root_zeroes_old_content() {
    let mut builder = message::Builder::new_default();
    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut list: flatwire::primitive_list::Builder<u16> = root.initn_as(10);
        for idx in 0..10 {
            list.set(idx, idx as u16);
        }
    }

    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        assert!(root.is_null());
    }

    let output = serialize::write_message_to_words(&builder);
    assert_eq!(output.len(), 40);
    for byte in &output[8..] {
        // Everything after the segment table reads zero.
        assert_eq!(*byte, 0u8);
    }
}

#[test]
fn set_root_deep_copies_between_messages() {
    let mut first = message::Builder::new_default();
    {
        let mut root: sample::Builder = first.init_root();
        root.set_id(99);
        root.set_label("original".into());
        let mut counts = root.init_counts(2);
        counts.set(0, 10);
        counts.set(1, 20);
    }

    let mut second = message::Builder::new_default();
    {
        let root: sample::Reader = first.get_root_as_reader().unwrap();
        second.set_root(root).unwrap();
    }

    let root: sample::Reader = second.get_root_as_reader().unwrap();
    assert_eq!(root.get_id(), 99);
    assert_eq!(root.get_label().unwrap(), "original");
    let counts = root.get_counts().unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts.get(0), 10);
    assert_eq!(counts.get(1), 20);
}

#[test]
fn text_requires_nul_terminator() {
    use flatwire::message::ValidationMode;
    use flatwire::word;

    // A struct whose text pointer's byte list lacks the trailing NUL.
    let words: &[flatwire::Word] = &[
        word(0, 0, 0, 0, 0, 0, 1, 0),    // root: struct, 0 data, 1 pointer
        word(0x01, 0, 0, 0, 0x32, 0, 0, 0), // text: list of 6 bytes
        word(b'o', b'o', b'p', b's', b'!', b'!', 0, 0),
    ];
    let segments: &[&[u8]] = &[flatwire::Word::words_to_bytes(words)];

    // By default the bad field reads as its default and the failure is
    // recorded on the reader.
    let reader = message::Reader::new(message::SegmentArray::new(segments), ReaderOptions::new());
    let root: pair::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_name().unwrap(), "");
    assert_eq!(
        reader.validation_error().unwrap().kind,
        flatwire::ErrorKind::TextMissingNulTerminator
    );

    // A strict reader surfaces it from the accessor instead.
    let mut options = ReaderOptions::new();
    options.validation_mode(ValidationMode::Strict);
    let reader = message::Reader::new(message::SegmentArray::new(segments), options);
    let root: pair::Reader = reader.get_root().unwrap();
    let err = root.get_name().unwrap_err();
    assert_eq!(err.kind, flatwire::ErrorKind::TextMissingNulTerminator);
}

#[test]
fn scratch_space_is_reusable() {
    use flatwire::message::{ScratchSpace, ScratchSpaceHeapAllocator};

    let mut buffer = flatwire::Word::allocate_zeroed_vec(64);

    let mut scratch = ScratchSpace::new(&mut buffer[..]);
    let first_bytes = {
        let mut builder = message::Builder::new(ScratchSpaceHeapAllocator::new(&mut scratch));
        let mut root: sample::Builder = builder.init_root();
        root.set_id(1);
        root.set_label("first".into());
        serialize::write_message_to_words(&builder)
    };

    // The allocator zeroed the scratch prefix on drop, so a second
    // message starts clean.
    let second_bytes = {
        let mut builder = message::Builder::new(ScratchSpaceHeapAllocator::new(&mut scratch));
        let mut root: sample::Builder = builder.init_root();
        root.set_id(1);
        root.set_label("first".into());
        serialize::write_message_to_words(&builder)
    };

    assert_eq!(first_bytes, second_bytes);

    let mut slice = &second_bytes[..];
    let reader = serialize::read_message_from_flat_slice(&mut slice, ReaderOptions::new()).unwrap();
    let root: sample::Reader = reader.get_root().unwrap();
    assert_eq!(root.get_id(), 1);
    assert_eq!(root.get_label().unwrap(), "first");
}

#[test]
fn has_returns_false_for_absent_pointer_fields() {
    let mut builder = message::Builder::new_default();
    {
        let mut root: sample::Builder = builder.init_root();
        root.set_id(5);
        assert!(!root.has_label());
        root.set_label("x".into());
        assert!(root.has_label());
    }

    let root: sample::Reader = builder.get_root_as_reader().unwrap();
    assert!(root.has_label());
    assert!(!root.has_counts());
    // An absent list still reads as an empty default.
    assert_eq!(root.get_counts().unwrap().len(), 0);
}

#[test]
fn object_fields_expose_their_wire_kind() {
    use flatwire::internal::layout::ObjectReader;

    let mut builder = message::Builder::new_default();
    {
        let root: flatwire::any_pointer::Builder = builder.init_root();
        let mut list: flatwire::primitive_list::Builder<u8> = root.initn_as(3);
        list.set(0, 7);
        list.set(1, 8);
        list.set(2, 9);
    }

    let reader = builder.into_reader();
    let root: flatwire::any_pointer::Reader = reader.get_root().unwrap();
    match root.get_object().unwrap() {
        ObjectReader::List(list) => assert_eq!(list.len(), 3),
        ObjectReader::Struct(_) => panic!("expected a list, got a struct"),
        ObjectReader::Null => panic!("expected a list, got null"),
    }
}
