//! Compact, mutable, self-describing binary tuples over caller memory.
//!
//! A tuple is an ordered bag of typed, column-tagged fields living in a
//! caller-provided, fixed-size region.  All storage is addressed in 4-byte
//! little-endian units: a descriptor band grows downward from a fixed pivot
//! while a payload heap grows upward, and the unit below the band is kept
//! free so freezing the tuple into a shippable byte image is a single word
//! write, with no copy.
//!
//! ```
//! use packtup::TupleBuilder;
//!
//! let mut region = [0u8; 256];
//! let mut tuple = TupleBuilder::init(&mut region, 8)?;
//! tuple.insert_uint16(0xA, 0xAA42)?;
//! tuple.insert_cstr(0xB, "hello")?;
//!
//! let image = tuple.take();
//! assert_eq!(image.get_uint16(0xA)?, 0xAA42);
//! assert_eq!(image.get_cstr(0xB)?, "hello");
//! # Ok::<(), packtup::Error>(())
//! ```
//!
//! Nothing here allocates, blocks, or keeps global state; the mutable side
//! needs exclusive access while a frozen [`TupleView`] may be read from any
//! number of threads.

pub mod arena;
pub mod check;
mod mutate;
mod shrink;
pub mod types;
pub mod view;

/// The mutable tuple under construction.
pub use arena::TupleBuilder;
/// Structural-validation diagnostics.
pub use check::CheckError;
/// Operation status for the fallible surface.
pub use types::Error;
/// Type-set masks for filtered lookup and bulk erase.
pub use types::TypeFilter;
/// Wire tags of field values.
pub use types::TypeTag;
pub use types::{
    BUFFER_ENOUGH, MAX_COLS, MAX_FIELDS, MAX_TUPLE_BYTES, MAX_TUPLE_UNITS, UNIT_SIZE,
};
/// Descriptor packing, exposed for diagnostics and tests.
pub use types::{ct_column, ct_is_dead, ct_tag, pack_ct, DEAD_CT, LT_MASK, LX_MASK, T2B, T2U};
/// A live field resolved by lookup or iteration.
pub use view::FieldRef;
/// Live-field iterator.
pub use view::Fields;
/// The frozen, read-only tuple image.
pub use view::TupleView;
