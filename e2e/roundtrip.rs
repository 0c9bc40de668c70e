//! E2E: frozen round-trips and binary stability.
//!
//! Freezing must produce a validating image whose every live field reads back
//! as inserted, and two tuples driven through the same operation sequence
//! (shrinks included) must freeze to byte-identical images, independent of
//! their region sizes.

use packtup::{TupleBuilder, TupleView, TypeTag, UNIT_SIZE};

fn drive(t: &mut TupleBuilder<'_>) {
    t.insert_uint16(0xA, 0xAA42).unwrap();
    t.insert_cstr(0xB, "stable").unwrap();
    t.insert_uint64(0xC, u64::MAX / 3).unwrap();
    t.insert_opaque(0xD, &[0xEE; 7]).unwrap();
    assert_eq!(t.erase(0xB, TypeTag::Cstr), 1);
    t.upsert_uint64(0xC, 12_345).unwrap();
    t.shrink();
    t.insert_fp64(0xE, 2.5).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario: empty tuple
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_tuple_freezes_to_a_single_word() {
    let mut buf = vec![0u8; 64 * UNIT_SIZE];
    let mut t = TupleBuilder::init(&mut buf, 16).unwrap();
    t.shrink();
    assert_eq!(t.field_count(), 0);
    assert_eq!(t.junk_units(), 0);

    let img = t.take();
    assert_eq!(img.total_bytes(), 4);
    assert_eq!(img.item_slots(), 0);
    img.check().unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn every_live_field_reads_back_from_the_image() {
    let mut buf = vec![0u8; 1024];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    drive(&mut t);

    let img = t.take();
    img.check().unwrap();
    assert_eq!(img.get_uint16(0xA), Ok(0xAA42));
    assert_eq!(img.get_uint64(0xC), Ok(12_345));
    assert_eq!(img.get_opaque(0xD), Ok(&[0xEE; 7][..]));
    assert_eq!(img.get_fp64(0xE), Ok(2.5));
    assert!(img.lookup(0xB, TypeTag::Cstr).is_none());
    assert_eq!(img.field_count(), 4);
}

#[test]
fn reheated_image_round_trips_through_nesting() {
    let mut buf = vec![0u8; 1024];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    drive(&mut t);
    let img = t.take().as_bytes().to_vec();

    // Ship the image, embed it elsewhere, and read it back out.
    let mut outer_buf = vec![0u8; 2048];
    let mut outer = TupleBuilder::init(&mut outer_buf, 4).unwrap();
    outer
        .insert_nested(1, &TupleView::new(&img))
        .unwrap();
    let outer_img = outer.take();
    outer_img.check().unwrap();

    let sub = outer_img.get_nested(1).unwrap();
    assert_eq!(sub.as_bytes(), &img[..]);
    assert_eq!(sub.get_uint16(0xA), Ok(0xAA42));
    assert_eq!(sub.get_uint64(0xC), Ok(12_345));
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary stability
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_operations_freeze_to_identical_bytes() {
    let mut buf_a = vec![0u8; 1024];
    let mut a = TupleBuilder::init(&mut buf_a, 8).unwrap();
    drive(&mut a);
    let img_a = a.take().as_bytes().to_vec();

    let mut buf_b = vec![0u8; 1024];
    let mut b = TupleBuilder::init(&mut buf_b, 8).unwrap();
    drive(&mut b);
    let img_b = b.take().as_bytes().to_vec();

    assert_eq!(img_a, img_b);
}

#[test]
fn region_size_does_not_leak_into_the_image() {
    let mut small = vec![0u8; 512];
    let mut a = TupleBuilder::init(&mut small, 8).unwrap();
    drive(&mut a);
    let img_a = a.take().as_bytes().to_vec();

    let mut large = vec![0u8; 8192];
    let mut b = TupleBuilder::init(&mut large, 8).unwrap();
    drive(&mut b);
    let img_b = b.take().as_bytes().to_vec();

    assert_eq!(img_a, img_b);
}

#[test]
fn noshrink_and_shrunk_images_agree_on_live_values() {
    let mut buf = vec![0u8; 1024];
    let mut t = TupleBuilder::init(&mut buf, 8).unwrap();
    t.insert_uint16(1, 11).unwrap();
    t.insert_cstr(2, "twenty-two").unwrap();
    t.insert_uint32(3, 33).unwrap();
    assert_eq!(t.erase(2, TypeTag::Cstr), 1);

    let loose = t.take_noshrink().as_bytes().to_vec();
    let tight = t.take().as_bytes().to_vec();
    assert!(tight.len() < loose.len());

    for img in [&loose, &tight] {
        let view = TupleView::new(img);
        view.check().unwrap();
        assert_eq!(view.get_uint16(1), Ok(11));
        assert_eq!(view.get_uint32(3), Ok(33));
        assert!(view.lookup(2, TypeTag::Cstr).is_none());
        assert_eq!(view.field_count(), 2);
    }
}
