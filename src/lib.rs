//! Indexable skip lists: an ordered map and set with rank queries, and
//! a Redis-style sorted set built on top of them.
//!
//! Conceptually, a skip list is arranged as follows:
//!
//! ```text
//! <head> ----------> [2] --------------------------------------------------> [9] ---------->
//! <head> ----------> [2] ------------------------------------[7] ----------> [9] ---------->
//! <head> ----------> [2] ----------> [4] ------------------> [7] ----------> [9] --> [10] ->
//! <head> --> [1] --> [2] --> [3] --> [4] --> [5] --> [6] --> [7] --> [8] --> [9] --> [10] ->
//! ```
//!
//! Every node takes part in the bottom chain, and randomly reaches some
//! number of levels above it; searches descend the towers instead of
//! visiting every element, giving expected `O(log n)` operations.
//!
//! The lists in this crate differ from a classical skip list in two
//! ways:
//!
//! - Every link carries a **span**, the number of bottom-level steps it
//!   covers.  Adding spans up during a descent yields the 1-based
//!   position of a key ([`SkipMap::rank`]) and, inverted, the key at a
//!   given position ([`SkipMap::cursor_at_rank`]), both in expected
//!   `O(log n)` instead of `O(n)`.
//! - The bottom level is doubly linked and the greatest node is cached,
//!   so cursors walk in either direction and seeking to the end is
//!   `O(1)`.
//!
//! [`ZSet`] combines a [`SkipMap`] with a hash index to get a sorted
//! set in the Redis sense: keys carry scores, ties are broken by
//! insertion order, and membership, rank, range-by-rank and
//! range-by-score are all cheap.
//!
//! All structures are single-threaded; wrap them in a lock if they must
//! be shared.
//!
//! # Safety
//!
//! The map and set accept a custom ordering function, which **must** be
//! a strict total order:
//!
//! - Be well defined: `f(a, b)` should always return the same value
//! - Be anti-symmetric: `f(a, b) == Greater` if and only if
//!   `f(b, a) == Less`, and `f(a, b) == Equal == f(b, a)`.
//! - Be transitive: If `f(a, b) == Greater` and `f(b, c) == Greater`
//!   then `f(a, c) == Greater`.
//!
//! An ordering function that breaks these rules leaves the structures
//! returning arbitrary results.

#![warn(missing_docs)]

pub mod level_generator;
pub mod skipmap;
pub mod skipset;
mod skipnode;
pub mod zset;

pub use crate::skipmap::SkipMap;
pub use crate::skipset::SkipSet;
pub use crate::zset::ZSet;
