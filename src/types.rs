//! Format constants, the field-type taxonomy, and descriptor packing.
//!
//! Everything in a tuple is addressed in 4-byte little-endian *units*.  A
//! field descriptor is one unit holding a packed `(column, type)` word in its
//! low half and either an inline value or a self-relative payload offset in
//! its high half.  Variable-length payloads start with a *varlen* word whose
//! low half is the payload's unit count (`brutto`) and whose high half is a
//! type-dependent auxiliary value (exact byte length for opaque blobs, item
//! count plus flag bits for a tuple image).

use core::fmt;
use std::error;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ─────────────────────────────────────────────────────────────────────────────
// Format limits
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the addressing quantum, in bytes.
pub const UNIT_SIZE: usize = 4;

/// Maximum number of units a tuple region may span (`brutto` is 16 bits).
pub const MAX_TUPLE_UNITS: usize = u16::MAX as usize;

/// Maximum byte size of a tuple region.
pub const MAX_TUPLE_BYTES: usize = MAX_TUPLE_UNITS * UNIT_SIZE;

/// Number of low bits of a `ct` word holding the type tag.
pub const TAG_BITS: u32 = 5;

/// Mask selecting the type-tag bits of a `ct` word.
pub const TAG_MASK: u16 = (1 << TAG_BITS) - 1;

/// Maximum column tag.  The 16-bit `ct` word keeps 5 bits for the type, which
/// leaves 11 bits for the column; columns above this value are rejected with
/// [`Error::InvalidArgument`].
pub const MAX_COLS: u16 = (1 << (16 - TAG_BITS)) - 1;

/// Maximum number of descriptor slots a tuple may reserve.
pub const MAX_FIELDS: usize = MAX_COLS as usize;

/// Descriptor word marking a tombstoned (erased) field.  The tag bits hold
/// 31, which no concrete type occupies, so no `(column, type)` packing of
/// valid inputs can collide with it.
pub const DEAD_CT: u16 = 0xFFFF;

/// Mask selecting the item-count bits of a tuple image's varlen word.
pub const LT_MASK: u16 = 0x3FFF;

/// Flag bits reserved for the ordered-tuple mode.  Writers keep them zero and
/// readers reject any image that sets them.
pub const LX_MASK: u16 = !LT_MASK;

/// A region size sufficient for any tuple, convenient for scratch buffers.
pub const BUFFER_ENOUGH: usize = MAX_TUPLE_BYTES;

// ─────────────────────────────────────────────────────────────────────────────
// Type taxonomy
// ─────────────────────────────────────────────────────────────────────────────

/// Wire tag of a field's value.
///
/// Tags `Null` through `Bin256` are fixed width: their payload size is a
/// function of the tag alone (see [`TypeTag::units`]).  `Cstr`, `Opaque`, and
/// `Nested` are variable length.  `FArray` is reserved by the format for
/// arrays of fixed-typed values; the builder never produces it and the
/// validator rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum TypeTag {
    Null = 0,
    /// The only inline type: the value lives in the descriptor itself.
    Uint16 = 1,
    Int32 = 2,
    Uint32 = 3,
    Int64 = 4,
    Uint64 = 5,
    Fp32 = 6,
    Fp64 = 7,
    Bin96 = 8,
    Bin128 = 9,
    Bin160 = 10,
    Bin192 = 11,
    Bin256 = 12,
    /// Zero-terminated byte string; the length is implied by the terminator,
    /// not stored.
    Cstr = 13,
    /// Length-prefixed blob; the varlen word records the exact byte length.
    Opaque = 14,
    /// An embedded tuple image.
    Nested = 15,
    /// Reserved, unimplemented.
    FArray = 16,
}

/// Payload unit counts for the fixed-width tags, indexed by tag value.
pub const T2U: [usize; 13] = [0, 0, 1, 1, 2, 2, 1, 2, 3, 4, 5, 6, 8];

/// Payload byte counts for the fixed-width tags, indexed by tag value.
pub const T2B: [usize; 13] = [0, 2, 4, 4, 8, 8, 4, 8, 12, 16, 20, 24, 32];

impl TypeTag {
    /// Whether the payload size is a function of the tag alone.
    #[inline]
    pub const fn is_fixed(self) -> bool {
        (self as u16) <= (TypeTag::Bin256 as u16)
    }

    /// Whether the value is stored in the descriptor itself (no payload).
    #[inline]
    pub const fn is_inline(self) -> bool {
        matches!(self, TypeTag::Null | TypeTag::Uint16)
    }

    /// Payload size in units for a fixed-width tag; `None` for the
    /// variable-length tags.
    #[inline]
    pub const fn units(self) -> Option<usize> {
        if self.is_fixed() {
            Some(T2U[self as usize])
        } else {
            None
        }
    }

    /// Payload size in bytes for a fixed-width tag.
    #[inline]
    pub const fn bytes(self) -> Option<usize> {
        if self.is_fixed() {
            Some(T2B[self as usize])
        } else {
            None
        }
    }
}

bitflags! {
    /// A set of type tags, used by filtered lookup and bulk erase to match a
    /// column against any of several types at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFilter: u32 {
        const NULL = 1 << 0;
        const UINT16 = 1 << 1;
        const INT32 = 1 << 2;
        const UINT32 = 1 << 3;
        const INT64 = 1 << 4;
        const UINT64 = 1 << 5;
        const FP32 = 1 << 6;
        const FP64 = 1 << 7;
        const BIN96 = 1 << 8;
        const BIN128 = 1 << 9;
        const BIN160 = 1 << 10;
        const BIN192 = 1 << 11;
        const BIN256 = 1 << 12;
        const CSTR = 1 << 13;
        const OPAQUE = 1 << 14;
        const NESTED = 1 << 15;
        /// Every fixed-width tag.
        const ANY_FIXED = 0x1FFF;
        /// Every concrete tag.
        const ANY = 0xFFFF;
    }
}

impl From<TypeTag> for TypeFilter {
    fn from(tag: TypeTag) -> Self {
        Self::from_bits_truncate(1u32 << u16::from(tag))
    }
}

impl TypeFilter {
    /// Whether `tag` is a member of the set.
    #[inline]
    pub fn matches(self, tag: TypeTag) -> bool {
        self.bits() & (1u32 << u16::from(tag)) != 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor and varlen-word packing
// ─────────────────────────────────────────────────────────────────────────────

/// Packs a column and type tag into a descriptor's `ct` word.
///
/// Injective over `column <= MAX_COLS`; never equal to [`DEAD_CT`], whose tag
/// bits no concrete type occupies.
#[inline]
pub const fn pack_ct(column: u16, tag: TypeTag) -> u16 {
    (column << TAG_BITS) | tag as u16
}

/// Column half of a `ct` word.
#[inline]
pub const fn ct_column(ct: u16) -> u16 {
    ct >> TAG_BITS
}

/// Raw tag bits of a `ct` word (may not name a concrete type).
#[inline]
pub const fn ct_tag_bits(ct: u16) -> u16 {
    ct & TAG_MASK
}

/// Whether a `ct` word marks a tombstoned descriptor.
#[inline]
pub const fn ct_is_dead(ct: u16) -> bool {
    ct == DEAD_CT
}

/// Type tag of a live `ct` word, if the tag bits name a concrete type.
#[inline]
pub fn ct_tag(ct: u16) -> Option<TypeTag> {
    TypeTag::try_from(ct_tag_bits(ct)).ok()
}

#[inline]
pub(crate) const fn desc_word(ct: u16, offset: u16) -> u32 {
    ct as u32 | (offset as u32) << 16
}

#[inline]
pub(crate) const fn desc_ct(word: u32) -> u16 {
    word as u16
}

#[inline]
pub(crate) const fn desc_offset(word: u32) -> u16 {
    (word >> 16) as u16
}

#[inline]
pub(crate) const fn varlen_word(brutto: u16, aux: u16) -> u32 {
    brutto as u32 | (aux as u32) << 16
}

#[inline]
pub(crate) const fn varlen_brutto(word: u32) -> u16 {
    word as u16
}

#[inline]
pub(crate) const fn varlen_aux(word: u32) -> u16 {
    (word >> 16) as u16
}

/// Rounds a byte count up to whole units.
#[inline]
pub(crate) const fn bytes_to_units(bytes: usize) -> usize {
    (bytes + UNIT_SIZE - 1) / UNIT_SIZE
}

// ─────────────────────────────────────────────────────────────────────────────
// Little-endian unit access
// ─────────────────────────────────────────────────────────────────────────────

// All region access goes through these two helpers, so the caller's buffer
// needs no particular alignment and the format stays little-endian on every
// host.

#[inline]
pub(crate) fn read_unit(buf: &[u8], unit: usize) -> u32 {
    let at = unit * UNIT_SIZE;
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
pub(crate) fn write_unit(buf: &mut [u8], unit: usize, value: u32) {
    let at = unit * UNIT_SIZE;
    buf[at..at + UNIT_SIZE].copy_from_slice(&value.to_le_bytes());
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned by tuple operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No live field matches the requested column and type.
    NoField,
    /// The operation would overflow the caller-provided region.
    NoSpace,
    /// An argument is out of range or malformed.
    InvalidArgument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::NoField => "no matching field",
            Error::NoSpace => "insufficient space in tuple region",
            Error::InvalidArgument => "invalid argument",
        })
    }
}

impl error::Error for Error {}
