//! Copy-on-write caches for PlayerTrack.
//!
//! Readers load an immutable snapshot and never block. Writers clone the
//! current map, apply their change and publish the result atomically, so a
//! reader always sees either the whole old state or the whole new state.
//!
//! # Key Types
//!
//! - [`KeyedCache`] -- a `HashMap` snapshot behind an `ArcSwap`

pub mod keyed;

pub use keyed::KeyedCache;
