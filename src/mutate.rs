//! Field insertion, update, upsert, and erase.
//!
//! Every mutator verifies descriptor-band and payload-heap space before it
//! writes anything; a failed call leaves the region untouched.  A tuple is a
//! bag, not a map: insertion never replaces, so several live fields may share
//! one `(column, type)` pair and update/upsert act on the first of them in
//! lookup order.

use crate::arena::{ct_match, TupleBuilder};
use crate::types::{
    bytes_to_units, ct_is_dead, desc_word, pack_ct, varlen_word, Error, TypeFilter, TypeTag,
    DEAD_CT, MAX_COLS, UNIT_SIZE,
};
use crate::view::TupleView;

impl<'a> TupleBuilder<'a> {
    // ─────────────────────────────────────────────────────────────────────────
    // Insert
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a field with no value.
    pub fn insert_null(&mut self, column: u16) -> Result<(), Error> {
        self.alloc_field(column, TypeTag::Null, 0).map(|_| ())
    }

    /// Adds a `uint16` field; the value lives inline in the descriptor.
    pub fn insert_uint16(&mut self, column: u16, value: u16) -> Result<(), Error> {
        let idx = self.alloc_field(column, TypeTag::Uint16, 0)?;
        self.set_unit(idx, desc_word(pack_ct(column, TypeTag::Uint16), value));
        Ok(())
    }

    pub fn insert_int32(&mut self, column: u16, value: i32) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Int32, &value.to_le_bytes())
    }

    pub fn insert_uint32(&mut self, column: u16, value: u32) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Uint32, &value.to_le_bytes())
    }

    pub fn insert_int64(&mut self, column: u16, value: i64) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Int64, &value.to_le_bytes())
    }

    pub fn insert_uint64(&mut self, column: u16, value: u64) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Uint64, &value.to_le_bytes())
    }

    pub fn insert_fp32(&mut self, column: u16, value: f32) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Fp32, &value.to_le_bytes())
    }

    pub fn insert_fp64(&mut self, column: u16, value: f64) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Fp64, &value.to_le_bytes())
    }

    pub fn insert_bin96(&mut self, column: u16, value: &[u8; 12]) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Bin96, value)
    }

    pub fn insert_bin128(&mut self, column: u16, value: &[u8; 16]) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Bin128, value)
    }

    pub fn insert_bin160(&mut self, column: u16, value: &[u8; 20]) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Bin160, value)
    }

    pub fn insert_bin192(&mut self, column: u16, value: &[u8; 24]) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Bin192, value)
    }

    pub fn insert_bin256(&mut self, column: u16, value: &[u8; 32]) -> Result<(), Error> {
        self.insert_fixed(column, TypeTag::Bin256, value)
    }

    /// Adds a zero-terminated string field.  The string may not contain an
    /// interior NUL byte.
    pub fn insert_cstr(&mut self, column: u16, value: &str) -> Result<(), Error> {
        let (data, units) = cstr_payload(value)?;
        let idx = self.alloc_field(column, TypeTag::Cstr, units)?;
        let pos = idx + self.offset_at(idx) as usize;
        self.place_payload(pos, None, data, units);
        Ok(())
    }

    /// Adds a length-prefixed blob field of up to 65 535 bytes.
    pub fn insert_opaque(&mut self, column: u16, value: &[u8]) -> Result<(), Error> {
        let (header, units) = opaque_header(value)?;
        let idx = self.alloc_field(column, TypeTag::Opaque, units)?;
        let pos = idx + self.offset_at(idx) as usize;
        self.place_payload(pos, Some(header), value, units);
        Ok(())
    }

    /// Embeds a frozen tuple image as a field.
    pub fn insert_nested(&mut self, column: u16, value: &TupleView<'_>) -> Result<(), Error> {
        let units = nested_units(value)?;
        let idx = self.alloc_field(column, TypeTag::Nested, units)?;
        let pos = idx + self.offset_at(idx) as usize;
        self.place_payload(pos, None, value.as_bytes(), units);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Update (fails with `NoField` when no matching live field exists)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn update_uint16(&mut self, column: u16, value: u16) -> Result<(), Error> {
        let idx = self.find_live(column, TypeTag::Uint16)?;
        self.set_unit(idx, desc_word(pack_ct(column, TypeTag::Uint16), value));
        Ok(())
    }

    pub fn update_int32(&mut self, column: u16, value: i32) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Int32, &value.to_le_bytes())
    }

    pub fn update_uint32(&mut self, column: u16, value: u32) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Uint32, &value.to_le_bytes())
    }

    pub fn update_int64(&mut self, column: u16, value: i64) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Int64, &value.to_le_bytes())
    }

    pub fn update_uint64(&mut self, column: u16, value: u64) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Uint64, &value.to_le_bytes())
    }

    pub fn update_fp32(&mut self, column: u16, value: f32) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Fp32, &value.to_le_bytes())
    }

    pub fn update_fp64(&mut self, column: u16, value: f64) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Fp64, &value.to_le_bytes())
    }

    pub fn update_bin96(&mut self, column: u16, value: &[u8; 12]) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Bin96, value)
    }

    pub fn update_bin128(&mut self, column: u16, value: &[u8; 16]) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Bin128, value)
    }

    pub fn update_bin160(&mut self, column: u16, value: &[u8; 20]) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Bin160, value)
    }

    pub fn update_bin192(&mut self, column: u16, value: &[u8; 24]) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Bin192, value)
    }

    pub fn update_bin256(&mut self, column: u16, value: &[u8; 32]) -> Result<(), Error> {
        self.update_fixed(column, TypeTag::Bin256, value)
    }

    pub fn update_cstr(&mut self, column: u16, value: &str) -> Result<(), Error> {
        let (data, units) = cstr_payload(value)?;
        let idx = self.find_live(column, TypeTag::Cstr)?;
        self.update_varlen_at(idx, None, data, units)
    }

    pub fn update_opaque(&mut self, column: u16, value: &[u8]) -> Result<(), Error> {
        let (header, units) = opaque_header(value)?;
        let idx = self.find_live(column, TypeTag::Opaque)?;
        self.update_varlen_at(idx, Some(header), value, units)
    }

    pub fn update_nested(&mut self, column: u16, value: &TupleView<'_>) -> Result<(), Error> {
        let units = nested_units(value)?;
        let idx = self.find_live(column, TypeTag::Nested)?;
        self.update_varlen_at(idx, None, value.as_bytes(), units)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upsert (update the first match, or insert when there is none)
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a null field unless one already exists at this column.
    pub fn upsert_null(&mut self, column: u16) -> Result<(), Error> {
        if column > MAX_COLS {
            return Err(Error::InvalidArgument);
        }
        match self.find_ct(pack_ct(column, TypeTag::Null)) {
            Some(_) => Ok(()),
            None => self.insert_null(column),
        }
    }

    pub fn upsert_uint16(&mut self, column: u16, value: u16) -> Result<(), Error> {
        match self.update_uint16(column, value) {
            Err(Error::NoField) => self.insert_uint16(column, value),
            done => done,
        }
    }

    pub fn upsert_int32(&mut self, column: u16, value: i32) -> Result<(), Error> {
        match self.update_int32(column, value) {
            Err(Error::NoField) => self.insert_int32(column, value),
            done => done,
        }
    }

    pub fn upsert_uint32(&mut self, column: u16, value: u32) -> Result<(), Error> {
        match self.update_uint32(column, value) {
            Err(Error::NoField) => self.insert_uint32(column, value),
            done => done,
        }
    }

    pub fn upsert_int64(&mut self, column: u16, value: i64) -> Result<(), Error> {
        match self.update_int64(column, value) {
            Err(Error::NoField) => self.insert_int64(column, value),
            done => done,
        }
    }

    pub fn upsert_uint64(&mut self, column: u16, value: u64) -> Result<(), Error> {
        match self.update_uint64(column, value) {
            Err(Error::NoField) => self.insert_uint64(column, value),
            done => done,
        }
    }

    pub fn upsert_fp32(&mut self, column: u16, value: f32) -> Result<(), Error> {
        match self.update_fp32(column, value) {
            Err(Error::NoField) => self.insert_fp32(column, value),
            done => done,
        }
    }

    pub fn upsert_fp64(&mut self, column: u16, value: f64) -> Result<(), Error> {
        match self.update_fp64(column, value) {
            Err(Error::NoField) => self.insert_fp64(column, value),
            done => done,
        }
    }

    pub fn upsert_bin96(&mut self, column: u16, value: &[u8; 12]) -> Result<(), Error> {
        match self.update_bin96(column, value) {
            Err(Error::NoField) => self.insert_bin96(column, value),
            done => done,
        }
    }

    pub fn upsert_bin128(&mut self, column: u16, value: &[u8; 16]) -> Result<(), Error> {
        match self.update_bin128(column, value) {
            Err(Error::NoField) => self.insert_bin128(column, value),
            done => done,
        }
    }

    pub fn upsert_bin160(&mut self, column: u16, value: &[u8; 20]) -> Result<(), Error> {
        match self.update_bin160(column, value) {
            Err(Error::NoField) => self.insert_bin160(column, value),
            done => done,
        }
    }

    pub fn upsert_bin192(&mut self, column: u16, value: &[u8; 24]) -> Result<(), Error> {
        match self.update_bin192(column, value) {
            Err(Error::NoField) => self.insert_bin192(column, value),
            done => done,
        }
    }

    pub fn upsert_bin256(&mut self, column: u16, value: &[u8; 32]) -> Result<(), Error> {
        match self.update_bin256(column, value) {
            Err(Error::NoField) => self.insert_bin256(column, value),
            done => done,
        }
    }

    pub fn upsert_cstr(&mut self, column: u16, value: &str) -> Result<(), Error> {
        match self.update_cstr(column, value) {
            Err(Error::NoField) => self.insert_cstr(column, value),
            done => done,
        }
    }

    pub fn upsert_opaque(&mut self, column: u16, value: &[u8]) -> Result<(), Error> {
        match self.update_opaque(column, value) {
            Err(Error::NoField) => self.insert_opaque(column, value),
            done => done,
        }
    }

    pub fn upsert_nested(&mut self, column: u16, value: &TupleView<'_>) -> Result<(), Error> {
        match self.update_nested(column, value) {
            Err(Error::NoField) => self.insert_nested(column, value),
            done => done,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Erase
    // ─────────────────────────────────────────────────────────────────────────

    /// Tombstones the first live field matching `(column, tag)`.  Returns the
    /// number of fields erased (0 or 1).  Neither descriptors nor payloads
    /// move; the freed units are accounted in
    /// [`junk_units`](TupleBuilder::junk_units) until the next shrink.
    pub fn erase(&mut self, column: u16, tag: TypeTag) -> usize {
        if column > MAX_COLS {
            return 0;
        }
        match self.find_ct(pack_ct(column, tag)) {
            Some(idx) => {
                self.kill(idx);
                1
            }
            None => 0,
        }
    }

    /// Tombstones every live field with this column and any type in
    /// `filter`.  Returns the number of fields erased.
    pub fn erase_all(&mut self, column: u16, filter: TypeFilter) -> usize {
        if column > MAX_COLS {
            return 0;
        }
        let mut erased = 0;
        for idx in self.head..self.pivot {
            if ct_match(self.ct_at(idx), column, filter) {
                self.kill(idx);
                erased += 1;
            }
        }
        erased
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Claims a descriptor slot and `payload_units` of heap, writing the
    /// descriptor word.  All space checks happen before the first write.
    /// Prefers the first dead slot (reclaiming its unit from `junk`) and
    /// extends the band downward otherwise.
    fn alloc_field(
        &mut self,
        column: u16,
        tag: TypeTag,
        payload_units: usize,
    ) -> Result<usize, Error> {
        if column > MAX_COLS {
            return Err(Error::InvalidArgument);
        }
        let slot = (self.head..self.pivot)
            .rev()
            .find(|&i| ct_is_dead(self.ct_at(i)));
        if slot.is_none() && self.head <= 1 {
            return Err(Error::NoSpace);
        }
        if self.tail + payload_units > self.end {
            return Err(Error::NoSpace);
        }

        let idx = match slot {
            Some(reused) => {
                self.junk -= 1;
                reused
            }
            None => {
                self.head -= 1;
                self.head
            }
        };
        let offset = if payload_units > 0 {
            let pos = self.tail;
            self.tail += payload_units;
            (pos - idx) as u16
        } else {
            0
        };
        self.set_unit(idx, desc_word(pack_ct(column, tag), offset));
        Ok(idx)
    }

    fn insert_fixed(&mut self, column: u16, tag: TypeTag, data: &[u8]) -> Result<(), Error> {
        let Some(units) = tag.units() else {
            return Err(Error::InvalidArgument);
        };
        let idx = self.alloc_field(column, tag, units)?;
        let pos = idx + self.offset_at(idx) as usize;
        self.place_payload(pos, None, data, units);
        Ok(())
    }

    fn update_fixed(&mut self, column: u16, tag: TypeTag, data: &[u8]) -> Result<(), Error> {
        let Some(units) = tag.units() else {
            return Err(Error::InvalidArgument);
        };
        let idx = self.find_live(column, tag)?;
        let pos = idx + self.offset_at(idx) as usize;
        self.place_payload(pos, None, data, units);
        Ok(())
    }

    /// Rewrites the variable-length payload of the field at `idx`.  A payload
    /// that fits the existing span is written in place (the freed remainder
    /// joins `junk`); a larger one is appended at `tail` and the descriptor
    /// retargeted, abandoning the old span to `junk`.
    fn update_varlen_at(
        &mut self,
        idx: usize,
        header: Option<u32>,
        data: &[u8],
        new_units: usize,
    ) -> Result<(), Error> {
        let old_units = self.payload_units_at(idx);
        if new_units <= old_units {
            let pos = idx + self.offset_at(idx) as usize;
            self.place_payload(pos, header, data, new_units);
            self.junk += old_units - new_units;
            return Ok(());
        }

        if self.tail + new_units > self.end {
            return Err(Error::NoSpace);
        }
        let pos = self.tail;
        self.tail += new_units;
        self.place_payload(pos, header, data, new_units);
        let ct = self.ct_at(idx);
        self.set_unit(idx, desc_word(ct, (pos - idx) as u16));
        self.junk += old_units;
        Ok(())
    }

    fn find_live(&self, column: u16, tag: TypeTag) -> Result<usize, Error> {
        if column > MAX_COLS {
            return Err(Error::InvalidArgument);
        }
        self.find_ct(pack_ct(column, tag)).ok_or(Error::NoField)
    }

    fn kill(&mut self, idx: usize) {
        let payload = self.payload_units_at(idx);
        self.junk += 1 + payload;
        let offset = self.offset_at(idx);
        self.set_unit(idx, desc_word(DEAD_CT, offset));
    }

    /// Writes an optional varlen word, the payload bytes, and zero padding
    /// through the end of the `units`-sized span starting at `pos`.
    fn place_payload(&mut self, pos: usize, header: Option<u32>, data: &[u8], units: usize) {
        let mut at = pos;
        if let Some(word) = header {
            self.set_unit(at, word);
            at += 1;
        }
        let start = at * UNIT_SIZE;
        let end = (pos + units) * UNIT_SIZE;
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.buf[start + data.len()..end].fill(0);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload shaping
// ─────────────────────────────────────────────────────────────────────────────

fn cstr_payload(value: &str) -> Result<(&[u8], usize), Error> {
    let data = value.as_bytes();
    if data.contains(&0) {
        return Err(Error::InvalidArgument);
    }
    // The terminator and the zero padding of the final unit coincide; the
    // span is sized so at least one zero byte follows the data.
    Ok((data, bytes_to_units(data.len() + 1)))
}

fn opaque_header(value: &[u8]) -> Result<(u32, usize), Error> {
    if value.len() > u16::MAX as usize {
        return Err(Error::InvalidArgument);
    }
    let brutto = bytes_to_units(value.len());
    Ok((varlen_word(brutto as u16, value.len() as u16), brutto + 1))
}

fn nested_units(value: &TupleView<'_>) -> Result<usize, Error> {
    if !value.is_consistent() {
        return Err(Error::InvalidArgument);
    }
    Ok(value.as_bytes().len() / UNIT_SIZE)
}
