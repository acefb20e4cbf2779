#![forbid(unsafe_code)]
//! Core primitives for ffindex.
//!
//! A forward index maps document and passage identifiers to stored embedding
//! vectors. Two backends implement [`Index`]: [`InMemoryIndex`] and the
//! single-file [`DiskIndex`]. [`Coalescer`] compresses one index into another
//! by merging runs of similar consecutive vectors of each document.

pub mod coalesce;
pub mod config;
pub mod disk;
pub mod error;
pub mod identifiers;
pub mod index;
pub mod memory;
pub mod retrieval;
pub mod vector;

pub use coalesce::{coalesce, coalesce_vectors, CoalesceReport, Coalescer, DistanceFn};
pub use config::{
    grown_capacity, IndexConfig, StorageDtype, DEFAULT_INITIAL_CAPACITY,
    DEFAULT_RESIZE_INCREMENT,
};
pub use disk::{DiskIndex, FORMAT_VERSION};
pub use error::IndexError;
pub use identifiers::{IdRecord, IdentifierIndex, Offset};
pub use index::{entries_from_columns, Index, VectorEntry};
pub use memory::InMemoryIndex;
pub use retrieval::{resolve_offsets, Mode, RetrievedVectors};
pub use vector::{cosine_distance, cosine_similarity_unchecked, euclidean_distance, VectorError};
