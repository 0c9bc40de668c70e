// Unit tests for structural validation: well-formed tuples pass, and each
// class of image damage is diagnosed.

use packtup::{CheckError, TupleBuilder, TupleView, TypeTag};

fn image_of(build: impl FnOnce(&mut TupleBuilder<'_>)) -> Vec<u8> {
    let mut buf = vec![0u8; 1024];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();
    build(&mut t);
    t.take_noshrink().as_bytes().to_vec()
}

// ─────────────────────────────────────────────────────────────────────────────
// Positives
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn valid_images_pass() {
    let img = image_of(|t| {
        t.insert_uint16(1, 7).unwrap();
        t.insert_uint64(2, 1 << 40).unwrap();
        t.insert_cstr(3, "abc").unwrap();
        t.insert_opaque(4, b"12345").unwrap();
    });
    TupleView::new(&img).check().unwrap();
}

#[test]
fn unshrunk_images_with_tombstones_pass() {
    let img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
        t.insert_uint32(2, 2).unwrap();
        assert_eq!(t.erase(1, TypeTag::Uint32), 1);
    });
    let view = TupleView::new(&img);
    view.check().unwrap();
    assert_eq!(view.field_count(), 1);
    assert_eq!(view.item_slots(), 2);
}

#[test]
fn empty_image_is_one_word() {
    let img = image_of(|_| {});
    assert_eq!(img.len(), 4);
    let view = TupleView::new(&img);
    view.check().unwrap();
    assert_eq!(view.field_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Negatives
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn truncated_image_is_rejected() {
    let img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
        t.insert_uint32(2, 2).unwrap();
    });
    let cut = &img[..img.len() - 4];
    assert!(matches!(
        TupleView::new(cut).check(),
        Err(CheckError::LengthMismatch { .. })
    ));
    // The per-read pre-checks refuse the image too.
    assert!(TupleView::new(cut).lookup(1, TypeTag::Uint32).is_none());
}

#[test]
fn ordered_flag_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_uint16(1, 7).unwrap();
    });
    img[3] |= 0x80; // high bit of the aux half of word 0
    let view = TupleView::new(&img);
    assert_eq!(view.check(), Err(CheckError::OrderedFlagSet));
    assert!(view.lookup(1, TypeTag::Uint16).is_none());
    assert_eq!(view.field_count(), 0);
}

#[test]
fn item_count_beyond_body_is_rejected() {
    let mut img = image_of(|_| {});
    img[2] = 1; // one item claimed, zero body units
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::BadItemCount { items: 1, brutto: 0 })
    ));
}

#[test]
fn unknown_type_tag_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
    });
    img[4] = (img[4] & 0xE0) | 17; // reserved tag bits in the descriptor
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::BadTypeTag { index: 1, .. })
    ));
}

#[test]
fn reserved_array_tag_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
    });
    img[4] = (img[4] & 0xE0) | 16;
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::BadTypeTag { index: 1, .. })
    ));
}

#[test]
fn payload_escaping_the_heap_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
    });
    img[6] = 0xFF; // descriptor offset far past the heap
    img[7] = 0xFF;
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::PayloadOutOfHeap { index: 1 })
    ));
}

#[test]
fn overlapping_payloads_are_rejected() {
    let mut img = image_of(|t| {
        t.insert_uint32(1, 1).unwrap();
        t.insert_uint32(2, 2).unwrap();
    });
    // Retarget the newer descriptor (image unit 1) onto the older payload.
    img[6] = 2;
    img[7] = 0;
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::PayloadOverlap { .. })
    ));
}

#[test]
fn unterminated_string_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_cstr(1, "abc").unwrap();
    });
    // "abc\0" fills its unit exactly; overwrite the terminator.
    let last = img.len() - 1;
    img[last] = b'x';
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::UnterminatedString { .. })
    ));
}

#[test]
fn opaque_length_disagreeing_with_span_is_rejected() {
    let mut img = image_of(|t| {
        t.insert_opaque(1, b"12345").unwrap();
    });
    // Varlen word sits at the payload start: image unit 2 for a one-field
    // tuple.  Claim nine bytes inside a two-unit span.
    img[10] = 9;
    img[11] = 0;
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::OpaqueLengthMismatch { .. })
    ));
}

#[test]
fn damaged_nested_image_is_rejected() {
    let inner = image_of(|t| {
        t.insert_uint32(9, 99).unwrap();
    });
    let mut img = image_of(|t| {
        t.insert_nested(1, &TupleView::new(&inner)).unwrap();
    });
    // The embedded image starts at unit 2; poison its descriptor's tag.
    img[12] = (img[12] & 0xE0) | 17;
    assert!(matches!(
        TupleView::new(&img).check(),
        Err(CheckError::NestedInvalid { index: 1 })
    ));
}

#[test]
fn diagnostics_render_for_humans() {
    let err = CheckError::BadTypeTag {
        index: 3,
        ct: 0x1234,
    };
    let text = err.to_string();
    assert!(text.contains("unit 3"));
    assert!(text.contains("0x1234"));
}
