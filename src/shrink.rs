//! In-place compaction of a mutable tuple.
//!
//! Erase and shrinking updates leave tombstoned descriptors and unreachable
//! payload spans behind; `shrink` repacks the live data so the junk count
//! returns to zero.  Descriptors keep their relative order (lookup tie-breaks
//! stay stable across compaction) and payloads move low-to-high by their
//! current heap position, so every copy's destination is at or below its
//! source and no unread span is ever overwritten.

use crate::arena::TupleBuilder;
use crate::types::{
    ct_is_dead, ct_tag, desc_ct, desc_offset, desc_word, MAX_FIELDS, UNIT_SIZE,
};

impl TupleBuilder<'_> {
    /// Repacks live descriptors and payloads, dropping tombstones and
    /// reclaiming unreachable units; afterwards
    /// [`junk_units`](TupleBuilder::junk_units) is zero.  The reserved
    /// descriptor band keeps its size, live values and their lookup order are
    /// unchanged, and a second call on an already-tight tuple is a no-op.
    pub fn shrink(&mut self) {
        if self.junk == 0 {
            return;
        }

        // Slide live descriptors up against the pivot.  Walking the band from
        // the top keeps every destination at or above its source, and a moved
        // descriptor's self-relative offset shrinks by the distance moved.
        let mut dst = self.pivot;
        for src in (self.head..self.pivot).rev() {
            let word = self.unit(src);
            let ct = desc_ct(word);
            if ct_is_dead(ct) {
                continue;
            }
            dst -= 1;
            if dst != src {
                let offset = desc_offset(word);
                let carries_payload = ct_tag(ct).is_some_and(|tag| !tag.is_inline());
                let offset = if carries_payload {
                    offset - (dst - src) as u16
                } else {
                    offset
                };
                self.set_unit(dst, desc_word(ct, offset));
            }
        }
        self.head = dst;

        // Order the surviving payload spans by heap position.  The spans are
        // disjoint, so compacting them in that order keeps destination <=
        // source throughout.
        let mut order = [(0u32, 0u32); MAX_FIELDS];
        let mut live = 0;
        for idx in self.head..self.pivot {
            let word = self.unit(idx);
            if ct_tag(desc_ct(word)).is_some_and(|tag| !tag.is_inline()) {
                let src = idx + desc_offset(word) as usize;
                order[live] = (src as u32, idx as u32);
                live += 1;
            }
        }
        order[..live].sort_unstable();

        let mut dst = self.pivot;
        for &(src, idx) in &order[..live] {
            let (src, idx) = (src as usize, idx as usize);
            let units = self.payload_units_at(idx);
            if dst != src {
                self.buf
                    .copy_within(src * UNIT_SIZE..(src + units) * UNIT_SIZE, dst * UNIT_SIZE);
                let ct = self.ct_at(idx);
                self.set_unit(idx, desc_word(ct, (dst - idx) as u16));
            }
            dst += units;
        }
        self.tail = dst;
        self.junk = 0;
    }
}
