//! The frozen tuple image and its read surface.
//!
//! Freezing is zero-copy: the unit below the descriptor band is always free,
//! so [`TupleBuilder::take_noshrink`] writes the image's varlen word there
//! and hands out the arena bytes in place.  A [`TupleView`] is a borrowed
//! `(base, length)` pair over such an image (a Rust slice is exactly the
//! scatter/gather-shaped record the wire contract asks for) and stays valid
//! until the next mutating call, which the borrow checker enforces.

use crate::arena::{ct_match, TupleBuilder};
use crate::types::{
    ct_column, ct_is_dead, ct_tag, desc_ct, desc_offset, pack_ct, read_unit, varlen_aux,
    varlen_brutto, varlen_word, Error, TypeFilter, TypeTag, LT_MASK, LX_MASK, MAX_COLS, T2B,
    UNIT_SIZE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Freeze
// ─────────────────────────────────────────────────────────────────────────────

impl<'a> TupleBuilder<'a> {
    /// Freezes the tuple as-is, tombstones and junk included.
    ///
    /// Writes the image's varlen word into the unit below the band and
    /// returns a view over the arena bytes; no data is copied.  The ordered
    /// flag bits are always left clear.
    pub fn take_noshrink(&mut self) -> TupleView<'_> {
        let brutto = (self.tail - self.head) as u16;
        let items = (self.pivot - self.head) as u16;
        self.set_unit(self.head - 1, varlen_word(brutto, items));
        TupleView::new(&self.buf[(self.head - 1) * UNIT_SIZE..self.tail * UNIT_SIZE])
    }

    /// Compacts, then freezes: the minimal image for the current live fields.
    pub fn take(&mut self) -> TupleView<'_> {
        self.shrink();
        self.take_noshrink()
    }

    /// Live fields of the mutable tuple, in insertion order.
    pub fn fields(&self) -> Fields<'_> {
        Fields {
            buf: self.buf,
            low: self.head,
            cursor: self.pivot,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TupleView
// ─────────────────────────────────────────────────────────────────────────────

/// A read-only tuple image over contiguous bytes.
///
/// Lookup and the typed getters perform the cheap image pre-checks on every
/// call (length versus `brutto`, reserved flag bits, column range) and report
/// a miss rather than touching an inconsistent image.  Untrusted input
/// should be run through [`check`](TupleView::check) before anything deeper
/// is read.
#[derive(Debug, Clone, Copy)]
pub struct TupleView<'a> {
    bytes: &'a [u8],
}

impl<'a> TupleView<'a> {
    /// Wraps `bytes` as a tuple image without validating them.
    pub fn new(bytes: &'a [u8]) -> Self {
        TupleView { bytes }
    }

    /// The underlying image: base pointer and byte length.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Total image size in bytes, varlen word included.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Descriptor slots in the image, tombstones included.
    pub fn item_slots(&self) -> usize {
        if self.bytes.len() < UNIT_SIZE {
            return 0;
        }
        (varlen_aux(read_unit(self.bytes, 0)) & LT_MASK) as usize
    }

    /// Number of live fields.
    pub fn field_count(&self) -> usize {
        self.fields().count()
    }

    /// Number of live fields passing `pred`.
    pub fn field_count_if(&self, mut pred: impl FnMut(&FieldRef<'a>) -> bool) -> usize {
        self.fields().filter(|field| pred(field)).count()
    }

    /// Live fields in insertion order.  Freezing preserves the band, whose
    /// insertion order runs from the last descriptor unit toward the first.
    pub fn fields(&self) -> Fields<'a> {
        if !self.is_consistent() {
            return Fields {
                buf: self.bytes,
                low: 0,
                cursor: 0,
            };
        }
        Fields {
            buf: self.bytes,
            low: 1,
            cursor: 1 + self.item_slots(),
        }
    }

    /// First live field with exactly this column and type, in insertion
    /// order.
    pub fn lookup(&self, column: u16, tag: TypeTag) -> Option<FieldRef<'a>> {
        if !self.is_consistent() || column > MAX_COLS {
            return None;
        }
        let ct = pack_ct(column, tag);
        (1..1 + self.item_slots())
            .rev()
            .find(|&i| desc_ct(read_unit(self.bytes, i)) == ct)
            .map(|i| FieldRef::new(self.bytes, i))
    }

    /// First live field with this column and any type in `filter`.
    pub fn lookup_filtered(&self, column: u16, filter: TypeFilter) -> Option<FieldRef<'a>> {
        if !self.is_consistent() || column > MAX_COLS {
            return None;
        }
        (1..1 + self.item_slots())
            .rev()
            .find(|&i| ct_match(desc_ct(read_unit(self.bytes, i)), column, filter))
            .map(|i| FieldRef::new(self.bytes, i))
    }

    /// The cheap per-read pre-checks: exact length, sane item count, ordered
    /// flag clear.
    pub(crate) fn is_consistent(&self) -> bool {
        if self.bytes.len() < UNIT_SIZE {
            return false;
        }
        let word = read_unit(self.bytes, 0);
        let brutto = varlen_brutto(word) as usize;
        let aux = varlen_aux(word);
        aux & LX_MASK == 0
            && self.bytes.len() == (brutto + 1) * UNIT_SIZE
            && (aux & LT_MASK) as usize <= brutto
    }

    // ── typed getters ────────────────────────────────────────────────────────

    pub fn get_uint16(&self, column: u16) -> Result<u16, Error> {
        self.getter(column, TypeTag::Uint16, FieldRef::uint16)
    }

    pub fn get_int32(&self, column: u16) -> Result<i32, Error> {
        self.getter(column, TypeTag::Int32, FieldRef::int32)
    }

    pub fn get_uint32(&self, column: u16) -> Result<u32, Error> {
        self.getter(column, TypeTag::Uint32, FieldRef::uint32)
    }

    pub fn get_int64(&self, column: u16) -> Result<i64, Error> {
        self.getter(column, TypeTag::Int64, FieldRef::int64)
    }

    pub fn get_uint64(&self, column: u16) -> Result<u64, Error> {
        self.getter(column, TypeTag::Uint64, FieldRef::uint64)
    }

    pub fn get_fp32(&self, column: u16) -> Result<f32, Error> {
        self.getter(column, TypeTag::Fp32, FieldRef::fp32)
    }

    pub fn get_fp64(&self, column: u16) -> Result<f64, Error> {
        self.getter(column, TypeTag::Fp64, FieldRef::fp64)
    }

    pub fn get_bin96(&self, column: u16) -> Result<&'a [u8; 12], Error> {
        self.getter(column, TypeTag::Bin96, FieldRef::bin96)
    }

    pub fn get_bin128(&self, column: u16) -> Result<&'a [u8; 16], Error> {
        self.getter(column, TypeTag::Bin128, FieldRef::bin128)
    }

    pub fn get_bin160(&self, column: u16) -> Result<&'a [u8; 20], Error> {
        self.getter(column, TypeTag::Bin160, FieldRef::bin160)
    }

    pub fn get_bin192(&self, column: u16) -> Result<&'a [u8; 24], Error> {
        self.getter(column, TypeTag::Bin192, FieldRef::bin192)
    }

    pub fn get_bin256(&self, column: u16) -> Result<&'a [u8; 32], Error> {
        self.getter(column, TypeTag::Bin256, FieldRef::bin256)
    }

    pub fn get_cstr(&self, column: u16) -> Result<&'a str, Error> {
        self.getter(column, TypeTag::Cstr, FieldRef::cstr)
    }

    pub fn get_opaque(&self, column: u16) -> Result<&'a [u8], Error> {
        self.getter(column, TypeTag::Opaque, FieldRef::opaque)
    }

    pub fn get_nested(&self, column: u16) -> Result<TupleView<'a>, Error> {
        self.getter(column, TypeTag::Nested, FieldRef::nested)
    }

    fn getter<T>(
        &self,
        column: u16,
        tag: TypeTag,
        read: impl Fn(&FieldRef<'a>) -> Option<T>,
    ) -> Result<T, Error> {
        let field = self.lookup(column, tag).ok_or(Error::NoField)?;
        // The tag already matched, so a read failure means damaged payload.
        read(&field).ok_or(Error::InvalidArgument)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FieldRef
// ─────────────────────────────────────────────────────────────────────────────

/// A resolved live field: one descriptor plus the unit space it points into.
///
/// The typed accessors return `None` on a tag mismatch or when the payload
/// cannot be read, mirroring the defaulted-miss convention of the getters.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    buf: &'a [u8],
    index: usize,
}

impl<'a> FieldRef<'a> {
    pub(crate) fn new(buf: &'a [u8], index: usize) -> Self {
        FieldRef { buf, index }
    }

    #[inline]
    fn word(&self) -> u32 {
        read_unit(self.buf, self.index)
    }

    /// Column tag of the field.
    pub fn column(&self) -> u16 {
        ct_column(desc_ct(self.word()))
    }

    /// Type tag of the field, when the tag bits name a concrete type.
    pub fn tag(&self) -> Option<TypeTag> {
        ct_tag(desc_ct(self.word()))
    }

    #[inline]
    fn payload_unit(&self) -> usize {
        self.index + desc_offset(self.word()) as usize
    }

    fn payload(&self, bytes: usize) -> Option<&'a [u8]> {
        let at = self.payload_unit() * UNIT_SIZE;
        self.buf.get(at..at + bytes)
    }

    fn fixed(&self, tag: TypeTag) -> Option<&'a [u8]> {
        if self.tag()? != tag {
            return None;
        }
        self.payload(T2B[tag as usize])
    }

    pub fn uint16(&self) -> Option<u16> {
        (self.tag()? == TypeTag::Uint16).then(|| desc_offset(self.word()))
    }

    pub fn int32(&self) -> Option<i32> {
        self.fixed(TypeTag::Int32)
            .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn uint32(&self) -> Option<u32> {
        self.fixed(TypeTag::Uint32)
            .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn int64(&self) -> Option<i64> {
        self.fixed(TypeTag::Int64)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn uint64(&self) -> Option<u64> {
        self.fixed(TypeTag::Uint64)
            .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn fp32(&self) -> Option<f32> {
        self.fixed(TypeTag::Fp32)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn fp64(&self) -> Option<f64> {
        self.fixed(TypeTag::Fp64)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn bin96(&self) -> Option<&'a [u8; 12]> {
        self.fixed(TypeTag::Bin96).map(|b| b.try_into().unwrap())
    }

    pub fn bin128(&self) -> Option<&'a [u8; 16]> {
        self.fixed(TypeTag::Bin128).map(|b| b.try_into().unwrap())
    }

    pub fn bin160(&self) -> Option<&'a [u8; 20]> {
        self.fixed(TypeTag::Bin160).map(|b| b.try_into().unwrap())
    }

    pub fn bin192(&self) -> Option<&'a [u8; 24]> {
        self.fixed(TypeTag::Bin192).map(|b| b.try_into().unwrap())
    }

    pub fn bin256(&self) -> Option<&'a [u8; 32]> {
        self.fixed(TypeTag::Bin256).map(|b| b.try_into().unwrap())
    }

    /// String value up to (not including) the terminator.  `None` when the
    /// bytes are not valid UTF-8.
    pub fn cstr(&self) -> Option<&'a str> {
        if self.tag()? != TypeTag::Cstr {
            return None;
        }
        let bytes = self.buf.get(self.payload_unit() * UNIT_SIZE..)?;
        let len = bytes.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&bytes[..len]).ok()
    }

    /// Blob contents, exactly as long as the stored byte length.
    pub fn opaque(&self) -> Option<&'a [u8]> {
        if self.tag()? != TypeTag::Opaque {
            return None;
        }
        let header = self.payload(UNIT_SIZE)?;
        let word = u32::from_le_bytes(header.try_into().unwrap());
        let len = varlen_aux(word) as usize;
        let data = (self.payload_unit() + 1) * UNIT_SIZE;
        self.buf.get(data..data + len)
    }

    /// The embedded tuple image of a nested field.
    pub fn nested(&self) -> Option<TupleView<'a>> {
        if self.tag()? != TypeTag::Nested {
            return None;
        }
        let pos = self.payload_unit();
        let brutto = varlen_brutto(u32::from_le_bytes(self.payload(UNIT_SIZE)?.try_into().unwrap()));
        let image = self
            .buf
            .get(pos * UNIT_SIZE..(pos + brutto as usize + 1) * UNIT_SIZE)?;
        Some(TupleView::new(image))
    }

    /// The field's raw value bytes: the payload span for out-of-line types,
    /// the two inline bytes for `uint16`, the terminated string for `cstr`,
    /// the exact blob for `opaque`, the whole image for `nested`, and an
    /// empty slice for `null`.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        let tag = self.tag()?;
        match tag {
            TypeTag::Null => Some(&self.buf[..0]),
            TypeTag::Uint16 => {
                let at = self.index * UNIT_SIZE + 2;
                self.buf.get(at..at + 2)
            }
            TypeTag::Cstr => {
                let bytes = self.buf.get(self.payload_unit() * UNIT_SIZE..)?;
                let len = bytes.iter().position(|&b| b == 0)?;
                Some(&bytes[..len + 1])
            }
            TypeTag::Opaque => self.opaque(),
            TypeTag::Nested => self.nested().map(|view| view.as_bytes()),
            TypeTag::FArray => None,
            _ => self.payload(T2B[tag as usize]),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Iteration
// ─────────────────────────────────────────────────────────────────────────────

/// Iterator over live fields in insertion order, skipping tombstones.
///
/// Walks the descriptor units from high to low; the band grows downward, so
/// that is oldest-first.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    buf: &'a [u8],
    low: usize,
    cursor: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = FieldRef<'a>;

    fn next(&mut self) -> Option<FieldRef<'a>> {
        while self.cursor > self.low {
            self.cursor -= 1;
            let index = self.cursor;
            if !ct_is_dead(desc_ct(read_unit(self.buf, index))) {
                return Some(FieldRef::new(self.buf, index));
            }
        }
        None
    }
}
