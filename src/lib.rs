#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod algorithm;
pub mod allocator;

/// Error types reported by fallible allocation paths.
pub mod error;

/// A HashMap built on the open-addressing table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers and
/// allocators.
pub mod hash_map;

/// The open-addressing hash table with tombstone deletion.
///
/// Callers supply the 32-bit hash and an equality predicate for every
/// operation; the table stores the hash next to each value.
pub mod hash_table;

pub mod lifetime;
pub mod vector;

pub use allocator::Allocator;
pub use allocator::Heap;
pub use error::TryReserveError;
pub use hash_map::DefaultHashBuilder;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_table::HashTable;
pub use lifetime::TypeTraits;
pub use vector::Vector;
