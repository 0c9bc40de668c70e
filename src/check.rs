//! Structural validation of mutable tuples and frozen images.
//!
//! `check` verifies the zone invariants, every descriptor's tag, every
//! payload's placement (inside the heap, no overlaps, strings terminated,
//! nested images recursively valid), and, for a mutable tuple, that the
//! junk counter agrees with what the descriptors actually reach.  Readers may
//! treat a tuple that passes as safe to traverse; everything else in the
//! crate assumes validated input and degrades to `None`/error results rather
//! than panicking.

use core::fmt;
use std::error;

use crate::arena::TupleBuilder;
use crate::types::{
    bytes_to_units, ct_is_dead, ct_tag, desc_ct, desc_offset, read_unit, varlen_aux,
    varlen_brutto, TypeTag, LT_MASK, LX_MASK, MAX_FIELDS, MAX_TUPLE_UNITS, UNIT_SIZE,
};
use crate::view::TupleView;

/// Nested images may nest further, but not without bound.
const MAX_NESTING: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// A structural defect found by `check`.  `Display` renders the diagnostic;
/// unit indices are relative to the tuple being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    /// The zone indices are out of order or exceed the format limit.
    BadBounds {
        head: usize,
        pivot: usize,
        tail: usize,
        end: usize,
    },
    /// The image's byte length disagrees with its `brutto` word.
    LengthMismatch { bytes: usize, brutto: usize },
    /// The image sets the reserved ordered-tuple bits.
    OrderedFlagSet,
    /// The image's item count exceeds its body or the field limit.
    BadItemCount { items: usize, brutto: usize },
    /// A descriptor's tag bits name no concrete type.
    BadTypeTag { index: usize, ct: u16 },
    /// A payload escapes the heap.
    PayloadOutOfHeap { index: usize },
    /// A string payload has no terminator inside the heap.
    UnterminatedString { index: usize },
    /// An opaque payload's byte length disagrees with its unit count.
    OpaqueLengthMismatch { index: usize },
    /// Two payload spans intersect.
    PayloadOverlap { unit: usize },
    /// The junk counter disagrees with the reachable data.
    JunkMismatch { junk: usize, expected: usize },
    /// A nested image failed validation.
    NestedInvalid { index: usize },
    /// Nested images recurse deeper than [`MAX_NESTING`] levels.
    NestingTooDeep { index: usize },
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CheckError::BadBounds {
                head,
                pivot,
                tail,
                end,
            } => write!(
                f,
                "zone indices out of order: head {head}, pivot {pivot}, tail {tail}, end {end}"
            ),
            CheckError::LengthMismatch { bytes, brutto } => write!(
                f,
                "image length {bytes} bytes disagrees with brutto {brutto} units"
            ),
            CheckError::OrderedFlagSet => f.write_str("reserved ordered-tuple flag is set"),
            CheckError::BadItemCount { items, brutto } => {
                write!(f, "item count {items} exceeds body of {brutto} units")
            }
            CheckError::BadTypeTag { index, ct } => {
                write!(f, "descriptor at unit {index}: unknown type in ct {ct:#06x}")
            }
            CheckError::PayloadOutOfHeap { index } => {
                write!(f, "descriptor at unit {index}: payload escapes the heap")
            }
            CheckError::UnterminatedString { index } => {
                write!(f, "descriptor at unit {index}: string payload is unterminated")
            }
            CheckError::OpaqueLengthMismatch { index } => write!(
                f,
                "descriptor at unit {index}: opaque byte length disagrees with its span"
            ),
            CheckError::PayloadOverlap { unit } => {
                write!(f, "payload spans overlap at unit {unit}")
            }
            CheckError::JunkMismatch { junk, expected } => {
                write!(f, "junk counter {junk} disagrees with reachable data ({expected})")
            }
            CheckError::NestedInvalid { index } => {
                write!(f, "descriptor at unit {index}: nested image is invalid")
            }
            CheckError::NestingTooDeep { index } => {
                write!(f, "descriptor at unit {index}: nested images recurse too deeply")
            }
        }
    }
}

impl error::Error for CheckError {}

// ─────────────────────────────────────────────────────────────────────────────
// Core walk
// ─────────────────────────────────────────────────────────────────────────────

struct LiveTotals {
    fields: usize,
    payload_units: usize,
}

/// Validates every descriptor in `desc` against the heap `[heap_start,
/// heap_end)`, including payload placement and overlaps, and totals the live
/// data for the caller's junk accounting.
fn check_fields(
    buf: &[u8],
    desc: core::ops::Range<usize>,
    heap_start: usize,
    heap_end: usize,
    depth: usize,
) -> Result<LiveTotals, CheckError> {
    let mut spans = [(0u32, 0u32); MAX_FIELDS];
    let mut used = 0;
    let mut totals = LiveTotals {
        fields: 0,
        payload_units: 0,
    };

    for index in desc {
        let word = read_unit(buf, index);
        let ct = desc_ct(word);
        if ct_is_dead(ct) {
            continue;
        }
        let tag = match ct_tag(ct) {
            Some(tag) if tag != TypeTag::FArray => tag,
            _ => return Err(CheckError::BadTypeTag { index, ct }),
        };
        totals.fields += 1;
        if tag.is_inline() {
            continue;
        }

        let pos = index + desc_offset(word) as usize;
        if pos < heap_start || pos >= heap_end {
            return Err(CheckError::PayloadOutOfHeap { index });
        }
        let units = match tag {
            TypeTag::Cstr => {
                let bytes = &buf[pos * UNIT_SIZE..heap_end * UNIT_SIZE];
                match bytes.iter().position(|&b| b == 0) {
                    Some(len) => bytes_to_units(len + 1),
                    None => return Err(CheckError::UnterminatedString { index }),
                }
            }
            TypeTag::Opaque => {
                let header = read_unit(buf, pos);
                let brutto = varlen_brutto(header) as usize;
                if bytes_to_units(varlen_aux(header) as usize) != brutto {
                    return Err(CheckError::OpaqueLengthMismatch { index });
                }
                brutto + 1
            }
            TypeTag::Nested => {
                let brutto = varlen_brutto(read_unit(buf, pos)) as usize;
                let nested_end = pos + brutto + 1;
                if nested_end > heap_end {
                    return Err(CheckError::PayloadOutOfHeap { index });
                }
                if depth + 1 > MAX_NESTING {
                    return Err(CheckError::NestingTooDeep { index });
                }
                let image = &buf[pos * UNIT_SIZE..nested_end * UNIT_SIZE];
                check_image(image, depth + 1).map_err(|_| CheckError::NestedInvalid { index })?;
                brutto + 1
            }
            // Fixed-width, resolved through the size table.
            _ => tag.units().unwrap_or(0),
        };
        if units == 0 || pos + units > heap_end {
            return Err(CheckError::PayloadOutOfHeap { index });
        }
        totals.payload_units += units;
        spans[used] = (pos as u32, (pos + units) as u32);
        used += 1;
    }

    let spans = &mut spans[..used];
    spans.sort_unstable();
    for pair in spans.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(CheckError::PayloadOverlap {
                unit: pair[1].0 as usize,
            });
        }
    }

    Ok(totals)
}

/// Validates a frozen image (recursively for nested fields).
pub(crate) fn check_image(bytes: &[u8], depth: usize) -> Result<(), CheckError> {
    if bytes.len() < UNIT_SIZE || bytes.len() % UNIT_SIZE != 0 {
        return Err(CheckError::LengthMismatch {
            bytes: bytes.len(),
            brutto: 0,
        });
    }
    let word = read_unit(bytes, 0);
    let brutto = varlen_brutto(word) as usize;
    let aux = varlen_aux(word);
    if aux & LX_MASK != 0 {
        return Err(CheckError::OrderedFlagSet);
    }
    let items = (aux & LT_MASK) as usize;
    if bytes.len() != (brutto + 1) * UNIT_SIZE {
        return Err(CheckError::LengthMismatch {
            bytes: bytes.len(),
            brutto,
        });
    }
    if items > brutto || items > MAX_FIELDS {
        return Err(CheckError::BadItemCount { items, brutto });
    }

    check_fields(bytes, 1..1 + items, 1 + items, brutto + 1, depth).map(|_| ())
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry points
// ─────────────────────────────────────────────────────────────────────────────

impl TupleBuilder<'_> {
    /// Full structural validation of the mutable tuple.
    pub fn check(&self) -> Result<(), CheckError> {
        if !(1 <= self.head
            && self.head <= self.pivot
            && self.pivot <= self.tail
            && self.tail <= self.end
            && self.end <= MAX_TUPLE_UNITS)
        {
            return Err(CheckError::BadBounds {
                head: self.head,
                pivot: self.pivot,
                tail: self.tail,
                end: self.end,
            });
        }

        let totals = check_fields(self.buf, self.head..self.pivot, self.pivot, self.tail, 0)?;

        // Everything in the band and heap that no live field reaches must be
        // accounted as junk, and nothing else.
        let dead_units = self.pivot - self.head - totals.fields;
        let loose_units = self.tail - self.pivot - totals.payload_units;
        let expected = dead_units + loose_units;
        if self.junk != expected {
            return Err(CheckError::JunkMismatch {
                junk: self.junk,
                expected,
            });
        }
        Ok(())
    }
}

impl TupleView<'_> {
    /// Full structural validation of the frozen image, nested fields
    /// included.
    pub fn check(&self) -> Result<(), CheckError> {
        check_image(self.as_bytes(), 0)
    }
}
