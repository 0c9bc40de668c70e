//! E2E: exhaustive insert/erase/shrink sweep.
//!
//! Every subset of six candidate fields (walked in gray-code order so
//! successive masks differ by one field) is built, then for every permutation
//! of the six positions each position in turn is erased from a fresh tuple.
//! After each erase the tuple must validate, compact to zero junk, and still
//! return every surviving value.

use packtup::{TupleBuilder, TypeTag, BUFFER_ENOUGH, MAX_FIELDS};

// ─────────────────────────────────────────────────────────────────────────────
// Permutation fixture
// ─────────────────────────────────────────────────────────────────────────────

const FACTORIAL_6: usize = 720;

/// The n-th permutation of `0..6`, decoded from the factorial number system
/// and consumed front to back.
struct Shuffle6 {
    items: [u8; 6],
    next: usize,
}

impl Shuffle6 {
    fn new(mut n: usize) -> Self {
        let mut pool: Vec<u8> = (0..6).collect();
        let mut items = [0u8; 6];
        let mut radix = FACTORIAL_6;
        for (k, slot) in items.iter_mut().enumerate() {
            radix /= 6 - k;
            *slot = pool.remove(n / radix);
            n %= radix;
        }
        Shuffle6 { items, next: 0 }
    }

    fn is_empty(&self) -> bool {
        self.next == self.items.len()
    }

    fn next(&mut self) -> u8 {
        let item = self.items[self.next];
        self.next += 1;
        item
    }
}

fn gray_code(n: u32) -> u32 {
    n ^ (n >> 1)
}

#[test]
fn shuffle6_enumerates_every_permutation_once() {
    let mut seen = std::collections::HashSet::new();
    for n in 0..FACTORIAL_6 {
        let mut order = Shuffle6::new(n);
        let mut perm = Vec::new();
        while !order.is_empty() {
            perm.push(order.next());
        }
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1, 2, 3, 4, 5]);
        assert!(seen.insert(perm), "permutation #{n} repeated");
    }
    assert_eq!(seen.len(), FACTORIAL_6);
}

// ─────────────────────────────────────────────────────────────────────────────
// Field schedule (index -> type and value)
// ─────────────────────────────────────────────────────────────────────────────

fn insert_item(t: &mut TupleBuilder<'_>, i: u16) {
    match i % 3 {
        0 => t.insert_uint16(i, 7717 * i).unwrap(),
        1 => t.insert_int32(i, -14_427_139 * i32::from(i)).unwrap(),
        _ => t
            .insert_uint64(i, 53_299_271_467_827_031 * u64::from(i))
            .unwrap(),
    }
}

fn erase_item(t: &mut TupleBuilder<'_>, i: u16) -> usize {
    match i % 3 {
        0 => t.erase(i, TypeTag::Uint16),
        1 => t.erase(i, TypeTag::Int32),
        _ => t.erase(i, TypeTag::Uint64),
    }
}

fn assert_item(t: &TupleBuilder<'_>, i: u16) {
    match i % 3 {
        0 => {
            let fp = t.lookup(i, TypeTag::Uint16).expect("uint16 field present");
            assert_eq!(Some(7717 * i), fp.uint16());
        }
        1 => {
            let fp = t.lookup(i, TypeTag::Int32).expect("int32 field present");
            assert_eq!(Some(-14_427_139 * i32::from(i)), fp.int32());
        }
        _ => {
            let fp = t.lookup(i, TypeTag::Uint64).expect("uint64 field present");
            assert_eq!(Some(53_299_271_467_827_031 * u64::from(i)), fp.uint64());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The sweep
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn erase_then_shrink_survives_every_subset_and_order() {
    let mut space = vec![0u8; BUFFER_ENOUGH];

    for create_iter in 0..(1u32 << 6) {
        let create_mask = gray_code(create_iter);
        for n in 0..FACTORIAL_6 {
            let mut order = Shuffle6::new(n);
            while !order.is_empty() {
                let mut pt = TupleBuilder::init(&mut space, MAX_FIELDS).unwrap();

                let mut count = 0usize;
                for i in 0..6u16 {
                    if create_mask & (1 << i) != 0 {
                        insert_item(&mut pt, i);
                        count += 1;
                    }
                }

                pt.check().unwrap();
                assert_eq!(0, pt.junk_units());
                assert_eq!(count, pt.field_count_if(|_| true));

                let o = u16::from(order.next());
                let present = usize::from(create_mask & (1 << o) != 0);
                assert_eq!(present, erase_item(&mut pt, o));

                let mut present_mask = create_mask;
                if present != 0 {
                    count -= 1;
                    present_mask &= !(1 << o);
                }

                pt.check().unwrap_or_else(|err| {
                    panic!(
                        "shuffle #{n}, create-mask {create_mask}, item #{o}: {err}"
                    )
                });
                assert_eq!(count, pt.field_count_if(|_| true));

                pt.shrink();
                pt.check().unwrap_or_else(|err| {
                    panic!(
                        "post-shrink, shuffle #{n}, create-mask {create_mask}, item #{o}: {err}"
                    )
                });
                assert_eq!(count, pt.field_count_if(|_| true));
                assert_eq!(0, pt.junk_units());

                for i in 0..6u16 {
                    if present_mask & (1 << i) != 0 {
                        assert_item(&pt, i);
                    }
                }
            }
        }
    }
}
