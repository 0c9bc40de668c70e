//! E2E: capacity boundaries.
//!
//! Fills tuples to exhaustion through both limiting resources, the
//! descriptor band and the payload heap, and verifies the failure is clean:
//! exact success counts, no stray tombstones, and a tuple that still
//! validates after every step.

use packtup::{Error, TupleBuilder, TypeTag, MAX_FIELDS, UNIT_SIZE};

#[test]
fn inline_inserts_stop_at_the_reserved_band() {
    for (units, reserve) in [(8usize, 3usize), (16, 5), (64, 63), (40, 10)] {
        let mut buf = vec![0u8; units * UNIT_SIZE];
        let mut t = TupleBuilder::init(&mut buf, reserve).unwrap();

        let mut inserted = 0u16;
        loop {
            match t.insert_uint16(inserted, 0x7000 | inserted) {
                Ok(()) => inserted += 1,
                Err(Error::NoSpace) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
            t.check().unwrap();
        }

        // Inline fields consume descriptor slots only, so the reserved band
        // is the binding limit.
        assert_eq!(usize::from(inserted), reserve, "region of {units} units");
        assert_eq!(t.field_count(), reserve);
        assert_eq!(t.junk_units(), 0);
        t.check().unwrap();

        for col in 0..inserted {
            assert_eq!(
                t.lookup(col, TypeTag::Uint16).unwrap().uint16(),
                Some(0x7000 | col)
            );
        }
    }
}

#[test]
fn payload_inserts_stop_at_the_heap_end() {
    // 16 units: one reserved, four band slots, eleven heap units.
    let mut buf = vec![0u8; 16 * UNIT_SIZE];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();

    // Each int64 takes one band slot and two heap units; the band runs out
    // first here.
    assert!(t.insert_int64(0, -1).is_ok());
    assert!(t.insert_int64(1, -2).is_ok());
    assert!(t.insert_int64(2, -3).is_ok());
    assert!(t.insert_int64(3, -4).is_ok());
    assert_eq!(t.insert_int64(4, -5), Err(Error::NoSpace));
    t.check().unwrap();

    // Three heap units remain; a six-unit string does not fit, a three-unit
    // one does.
    assert_eq!(t.erase(0, TypeTag::Int64), 1);
    assert_eq!(
        t.insert_cstr(5, "a string of fourteen"),
        Err(Error::NoSpace)
    );
    t.insert_cstr(5, "shorter one").unwrap();
    t.check().unwrap();
}

#[test]
fn heap_limited_fixed_inserts_count_exactly() {
    // 12 units: one reserved, six band slots, five heap units -> five uint32.
    let mut buf = vec![0u8; 12 * UNIT_SIZE];
    let mut t = TupleBuilder::init(&mut buf, 6).unwrap();

    let mut inserted = 0u16;
    loop {
        match t.insert_uint32(inserted, u32::from(inserted)) {
            Ok(()) => inserted += 1,
            Err(Error::NoSpace) => break,
            Err(err) => panic!("unexpected error: {err}"),
        }
        t.check().unwrap();
    }
    assert_eq!(inserted, 5);
    assert_eq!(t.field_count(), 5);
}

#[test]
fn reserve_limits_are_enforced_at_init() {
    let mut big = vec![0u8; 1 << 20];
    assert!(matches!(
        TupleBuilder::init(&mut big, MAX_FIELDS + 1),
        Err(Error::InvalidArgument)
    ));
    // An over-limit region is rejected outright.
    assert!(matches!(
        TupleBuilder::init(&mut big, 4),
        Err(Error::InvalidArgument)
    ));

    // The smallest usable region: the reserved unit plus the band.
    let mut minimal = vec![0u8; (1 + 2) * UNIT_SIZE];
    let mut t = TupleBuilder::init(&mut minimal, 2).unwrap();
    t.insert_uint16(0, 1).unwrap();
    t.insert_uint16(1, 2).unwrap();
    assert_eq!(t.insert_uint16(2, 3), Err(Error::NoSpace));
    t.check().unwrap();
}

#[test]
fn exhaustion_then_erase_then_reuse() {
    let mut buf = vec![0u8; 8 * UNIT_SIZE];
    let mut t = TupleBuilder::init(&mut buf, 4).unwrap();
    for col in 0..4 {
        t.insert_uint16(col, col).unwrap();
    }
    assert_eq!(t.insert_uint16(9, 9), Err(Error::NoSpace));

    assert_eq!(t.erase(1, TypeTag::Uint16), 1);
    t.insert_uint16(9, 9).unwrap();
    assert_eq!(t.insert_uint16(10, 10), Err(Error::NoSpace));
    assert_eq!(t.field_count(), 4);
    assert_eq!(t.junk_units(), 0);
    t.check().unwrap();
}
