//! Memoization keys.
//!
//! Memo tables inside a compile run (join trees per hint list) are keyed by a
//! content hash of the serialized request, so equal requests share an entry
//! regardless of where they come from.

mod hash;
pub use hash::compute_hash;
