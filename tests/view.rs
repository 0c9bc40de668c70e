// Unit tests for freezing and the read-only surface: image layout, lookup,
// typed getters, and iteration.

use packtup::{Error, TupleBuilder, TypeFilter, TypeTag, MAX_COLS};

// ─────────────────────────────────────────────────────────────────────────────
// Image layout
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn image_prefixes_body_with_one_varlen_word() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();
    t.insert_uint16(1, 0x1234).unwrap();
    t.insert_uint32(2, 99).unwrap();

    let img = t.take_noshrink();
    let bytes = img.as_bytes();
    // Word 0: brutto = body units, aux = descriptor count, flags clear.
    let word0 = u32::from_le_bytes(bytes[..4].try_into().unwrap());
    let brutto = (word0 & 0xFFFF) as usize;
    let aux = (word0 >> 16) as u16;
    assert_eq!(bytes.len(), (brutto + 1) * 4);
    assert_eq!(aux, 2);
    assert_eq!(img.item_slots(), 2);
    assert_eq!(img.field_count(), 2);
}

#[test]
fn take_equals_shrink_then_take_noshrink() {
    let ops = |t: &mut TupleBuilder<'_>| {
        t.insert_uint16(1, 10).unwrap();
        t.insert_cstr(2, "payload").unwrap();
        t.insert_uint64(3, 30).unwrap();
        assert_eq!(t.erase(2, TypeTag::Cstr), 1);
    };

    let mut buf_a = vec![0u8; 512];
    let mut a = TupleBuilder::init(&mut buf_a, 8).unwrap();
    ops(&mut a);
    let taken = a.take().as_bytes().to_vec();

    let mut buf_b = vec![0u8; 512];
    let mut b = TupleBuilder::init(&mut buf_b, 8).unwrap();
    ops(&mut b);
    b.shrink();
    let manual = b.take_noshrink().as_bytes().to_vec();

    assert_eq!(taken, manual);
}

#[test]
fn frozen_view_is_the_arena_bytes_in_place() {
    let mut buf = vec![0u8; 128];
    let mut t = TupleBuilder::init(&mut buf, 2).unwrap();
    t.insert_uint16(1, 42).unwrap();

    let img = t.take_noshrink();
    let copy = img.as_bytes().to_vec();
    // A second freeze with no mutation in between yields identical bytes.
    assert_eq!(t.take_noshrink().as_bytes(), &copy[..]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn filtered_lookup_returns_the_first_inserted_match() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    t.insert_uint16(5, 0x16).unwrap();
    t.insert_int32(5, 0x32).unwrap();
    t.insert_uint64(5, 0x64).unwrap();

    let img = t.take();
    let hit = img
        .lookup_filtered(5, TypeFilter::UINT16 | TypeFilter::INT32)
        .unwrap();
    assert_eq!(hit.tag(), Some(TypeTag::Uint16));
    assert_eq!(hit.uint16(), Some(0x16));

    let any = img.lookup_filtered(5, TypeFilter::ANY).unwrap();
    assert_eq!(any.tag(), Some(TypeTag::Uint16));
    assert!(img.lookup_filtered(5, TypeFilter::CSTR).is_none());
}

#[test]
fn lookup_rejects_out_of_range_columns_and_misses() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();
    t.insert_uint16(1, 7).unwrap();
    let img = t.take();

    assert!(img.lookup(MAX_COLS + 1, TypeTag::Uint16).is_none());
    assert!(img.lookup(2, TypeTag::Uint16).is_none());
    assert!(img.lookup(1, TypeTag::Uint32).is_none());
}

#[test]
fn lookup_skips_tombstones_in_unshrunk_images() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();
    t.insert_uint16(1, 10).unwrap();
    t.insert_uint16(2, 20).unwrap();
    assert_eq!(t.erase(1, TypeTag::Uint16), 1);

    let img = t.take_noshrink();
    assert!(img.lookup(1, TypeTag::Uint16).is_none());
    assert_eq!(img.lookup(2, TypeTag::Uint16).unwrap().uint16(), Some(20));
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed getters
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn getters_return_inserted_values() {
    let mut buf = vec![0u8; 1024];
    let mut t = TupleBuilder::init(&mut buf, 20).unwrap();
    t.insert_uint16(1, 0xAA42).unwrap();
    t.insert_int32(2, -14_427_139).unwrap();
    t.insert_uint32(3, 42).unwrap();
    t.insert_int64(4, -555).unwrap();
    t.insert_uint64(5, 53_299_271_467_827_031).unwrap();
    t.insert_fp32(6, 0.25).unwrap();
    t.insert_fp64(7, -8.5).unwrap();
    t.insert_bin96(8, &[1; 12]).unwrap();
    t.insert_bin128(9, &[2; 16]).unwrap();
    t.insert_bin160(10, &[3; 20]).unwrap();
    t.insert_bin192(11, &[4; 24]).unwrap();
    t.insert_bin256(12, &[5; 32]).unwrap();
    t.insert_cstr(13, "frozen").unwrap();
    t.insert_opaque(14, b"\xDE\xAD\xBE\xEF\x00\x01").unwrap();

    let img = t.take();
    img.check().unwrap();
    assert_eq!(img.get_uint16(1), Ok(0xAA42));
    assert_eq!(img.get_int32(2), Ok(-14_427_139));
    assert_eq!(img.get_uint32(3), Ok(42));
    assert_eq!(img.get_int64(4), Ok(-555));
    assert_eq!(img.get_uint64(5), Ok(53_299_271_467_827_031));
    assert_eq!(img.get_fp32(6), Ok(0.25));
    assert_eq!(img.get_fp64(7), Ok(-8.5));
    assert_eq!(img.get_bin96(8), Ok(&[1; 12]));
    assert_eq!(img.get_bin128(9), Ok(&[2; 16]));
    assert_eq!(img.get_bin160(10), Ok(&[3; 20]));
    assert_eq!(img.get_bin192(11), Ok(&[4; 24]));
    assert_eq!(img.get_bin256(12), Ok(&[5; 32]));
    assert_eq!(img.get_cstr(13), Ok("frozen"));
    assert_eq!(img.get_opaque(14), Ok(&b"\xDE\xAD\xBE\xEF\x00\x01"[..]));
}

#[test]
fn getters_miss_with_no_field() {
    let mut buf = vec![0u8; 128];
    let mut t = TupleBuilder::init(&mut buf, 2).unwrap();
    t.insert_uint16(1, 7).unwrap();
    let img = t.take();

    assert_eq!(img.get_uint16(9), Err(Error::NoField));
    assert_eq!(img.get_uint32(1), Err(Error::NoField)); // wrong type
    assert_eq!(img.get_cstr(1), Err(Error::NoField));
}

#[test]
fn nested_round_trip() {
    let mut inner_buf = vec![0u8; 128];
    let mut inner = TupleBuilder::init(&mut inner_buf, 2).unwrap();
    inner.insert_uint16(1, 11).unwrap();
    inner.insert_cstr(2, "in").unwrap();
    let inner_img = inner.take();

    let mut outer_buf = vec![0u8; 256];
    let mut outer = TupleBuilder::init(&mut outer_buf, 2).unwrap();
    outer.insert_nested(7, &inner_img).unwrap();
    outer.insert_uint16(8, 88).unwrap();

    let img = outer.take();
    img.check().unwrap();
    let sub = img.get_nested(7).unwrap();
    sub.check().unwrap();
    assert_eq!(sub.get_uint16(1), Ok(11));
    assert_eq!(sub.get_cstr(2), Ok("in"));
    assert_eq!(img.get_uint16(8), Ok(88));
}

// ─────────────────────────────────────────────────────────────────────────────
// Iteration and counting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn fields_iterate_in_insertion_order() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    t.insert_uint16(3, 0).unwrap();
    t.insert_uint16(1, 0).unwrap();
    t.insert_uint16(2, 0).unwrap();

    let builder_cols: Vec<u16> = t.fields().map(|f| f.column()).collect();
    assert_eq!(builder_cols, [3, 1, 2]);

    let img = t.take();
    let image_cols: Vec<u16> = img.fields().map(|f| f.column()).collect();
    assert_eq!(image_cols, [3, 1, 2]);
}

#[test]
fn counting_with_a_predicate() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    t.insert_uint16(1, 0).unwrap();
    t.insert_uint32(2, 0).unwrap();
    t.insert_uint16(3, 0).unwrap();
    t.erase(3, TypeTag::Uint16);

    assert_eq!(t.field_count(), 2);
    assert_eq!(t.field_count_if(|_| true), 2);
    assert_eq!(
        t.field_count_if(|f| f.tag() == Some(TypeTag::Uint16)),
        1
    );

    let img = t.take_noshrink();
    assert_eq!(img.field_count(), 2);
    assert_eq!(
        img.field_count_if(|f| f.tag() == Some(TypeTag::Uint16)),
        1
    );
}

#[test]
fn raw_value_bytes_per_type() {
    let mut buf = vec![0u8; 256];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    t.insert_null(0).unwrap();
    t.insert_uint16(1, 0x0201).unwrap();
    t.insert_uint32(2, 0x0403_0201).unwrap();
    t.insert_cstr(3, "ab").unwrap();
    t.insert_opaque(4, b"xyz").unwrap();

    let img = t.take();
    let by_col = |c: u16| img.lookup_filtered(c, TypeFilter::ANY).unwrap();
    assert_eq!(by_col(0).as_bytes(), Some(&[][..]));
    assert_eq!(by_col(1).as_bytes(), Some(&[0x01, 0x02][..]));
    assert_eq!(by_col(2).as_bytes(), Some(&[0x01, 0x02, 0x03, 0x04][..]));
    assert_eq!(by_col(3).as_bytes(), Some(&b"ab\0"[..]));
    assert_eq!(by_col(4).as_bytes(), Some(&b"xyz"[..]));
}
