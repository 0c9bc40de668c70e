//! The mutable arena: one tuple under construction inside caller memory.
//!
//! A [`TupleBuilder`] partitions its region into four zones by unit index:
//!
//! ```text
//! 0 ......... head ......... pivot ......... tail ......... end
//!   <-free->  |<-descriptors->|<---payload heap--->|<-free->|
//! ```
//!
//! The descriptor band grows *downward* (`head` decrements as fields are
//! added), the payload heap grows *upward* (`tail` increments).  `pivot` is
//! fixed at initialization, so the band can fill up before the heap does.
//! The unit below `head` is always free; freezing writes the image's varlen
//! word there, which is what makes [`TupleBuilder::take_noshrink`] zero-copy.

use core::fmt;

use crate::types::{
    bytes_to_units, ct_column, ct_is_dead, ct_tag, ct_tag_bits, desc_ct, desc_offset, pack_ct,
    read_unit, varlen_brutto, write_unit, Error, TypeFilter, TypeTag, MAX_COLS, MAX_FIELDS,
    MAX_TUPLE_UNITS, UNIT_SIZE,
};
use crate::view::FieldRef;

// ─────────────────────────────────────────────────────────────────────────────
// Shared descriptor helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a live descriptor word matches `column` and any tag in `filter`.
#[inline]
pub(crate) fn ct_match(ct: u16, column: u16, filter: TypeFilter) -> bool {
    !ct_is_dead(ct) && ct_column(ct) == column && filter.bits() & (1u32 << ct_tag_bits(ct)) != 0
}

/// Payload size in units of the live field whose descriptor sits at
/// `desc_unit`, with the heap ending at `heap_end`.
///
/// Fixed-width tags resolve through the size table; a cstr scans for its
/// terminator; opaque and nested read their varlen word.  Returns `None` when
/// the descriptor is malformed (reserved tag, payload outside the heap, or a
/// cstr with no terminator before `heap_end`).
pub(crate) fn field_payload_units(buf: &[u8], desc_unit: usize, heap_end: usize) -> Option<usize> {
    let word = read_unit(buf, desc_unit);
    let tag = ct_tag(desc_ct(word))?;
    if let Some(units) = tag.units() {
        return Some(units);
    }

    let pos = desc_unit + desc_offset(word) as usize;
    if pos >= heap_end {
        return None;
    }
    match tag {
        TypeTag::Cstr => {
            let bytes = &buf[pos * UNIT_SIZE..heap_end * UNIT_SIZE];
            let len = bytes.iter().position(|&b| b == 0)?;
            Some(bytes_to_units(len + 1))
        }
        TypeTag::Opaque | TypeTag::Nested => {
            Some(varlen_brutto(read_unit(buf, pos)) as usize + 1)
        }
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TupleBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// A mutable tuple over a caller-provided, fixed-size region.
///
/// All storage lives in the region; the builder itself holds only the zone
/// indices.  Mutating operations are transactional: they verify both
/// descriptor and payload space before writing anything, so a failed call
/// leaves the region bit-identical to its pre-call state.
pub struct TupleBuilder<'a> {
    pub(crate) buf: &'a mut [u8],
    pub(crate) head: usize,
    pub(crate) pivot: usize,
    pub(crate) tail: usize,
    pub(crate) end: usize,
    pub(crate) junk: usize,
}

impl fmt::Debug for TupleBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleBuilder")
            .field("head", &self.head)
            .field("pivot", &self.pivot)
            .field("tail", &self.tail)
            .field("end", &self.end)
            .field("junk", &self.junk)
            .finish_non_exhaustive()
    }
}

impl<'a> TupleBuilder<'a> {
    /// Interprets `region` as an empty tuple with room for `reserve_items`
    /// descriptors.
    ///
    /// Fails with [`Error::InvalidArgument`] when the region is not
    /// unit-aligned, cannot hold the reserved band plus the image-word unit,
    /// exceeds [`MAX_TUPLE_UNITS`], or `reserve_items` exceeds
    /// [`MAX_FIELDS`].
    pub fn init(region: &'a mut [u8], reserve_items: usize) -> Result<Self, Error> {
        if region.len() % UNIT_SIZE != 0 || reserve_items > MAX_FIELDS {
            return Err(Error::InvalidArgument);
        }
        let units = region.len() / UNIT_SIZE;
        if units < reserve_items + 1 || units > MAX_TUPLE_UNITS {
            return Err(Error::InvalidArgument);
        }

        let pivot = reserve_items + 1;
        Ok(TupleBuilder {
            buf: region,
            head: pivot,
            pivot,
            tail: pivot,
            end: units,
            junk: 0,
        })
    }

    /// Number of live fields.
    pub fn field_count(&self) -> usize {
        (self.head..self.pivot)
            .filter(|&i| !ct_is_dead(self.ct_at(i)))
            .count()
    }

    /// Number of live fields passing `pred`.
    pub fn field_count_if(&self, mut pred: impl FnMut(&FieldRef<'_>) -> bool) -> usize {
        (self.head..self.pivot)
            .filter(|&i| {
                !ct_is_dead(self.ct_at(i)) && pred(&FieldRef::new(self.buf, i))
            })
            .count()
    }

    /// Units currently unreachable from any live descriptor but not yet
    /// reclaimed by [`shrink`](TupleBuilder::shrink).
    pub fn junk_units(&self) -> usize {
        self.junk
    }

    /// Whether the tuple holds no live fields.
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    /// First live field with exactly this column and type, in insertion
    /// order.  Returns `None` for a column above [`MAX_COLS`].
    pub fn lookup(&self, column: u16, tag: TypeTag) -> Option<FieldRef<'_>> {
        if column > MAX_COLS {
            return None;
        }
        let ct = pack_ct(column, tag);
        self.find_ct(ct).map(|i| FieldRef::new(self.buf, i))
    }

    /// First live field with this column and any type in `filter`.
    pub fn lookup_filtered(&self, column: u16, filter: TypeFilter) -> Option<FieldRef<'_>> {
        if column > MAX_COLS {
            return None;
        }
        (self.head..self.pivot)
            .rev()
            .find(|&i| ct_match(self.ct_at(i), column, filter))
            .map(|i| FieldRef::new(self.buf, i))
    }

    // ── internal unit and descriptor access ──────────────────────────────────

    #[inline]
    pub(crate) fn unit(&self, idx: usize) -> u32 {
        read_unit(self.buf, idx)
    }

    #[inline]
    pub(crate) fn set_unit(&mut self, idx: usize, value: u32) {
        write_unit(self.buf, idx, value);
    }

    #[inline]
    pub(crate) fn ct_at(&self, idx: usize) -> u16 {
        desc_ct(self.unit(idx))
    }

    #[inline]
    pub(crate) fn offset_at(&self, idx: usize) -> u16 {
        desc_offset(self.unit(idx))
    }

    /// Descriptor slot of the earliest-inserted exact `ct` match, dead
    /// entries excluded by construction (no valid packing equals the dead
    /// word).  The band grows downward, so insertion order runs from the
    /// pivot toward the head.
    pub(crate) fn find_ct(&self, ct: u16) -> Option<usize> {
        (self.head..self.pivot).rev().find(|&i| self.ct_at(i) == ct)
    }

    /// Payload size in units of the live field at descriptor slot `idx`.
    pub(crate) fn payload_units_at(&self, idx: usize) -> usize {
        field_payload_units(self.buf, idx, self.tail).unwrap_or(0)
    }
}
