//! Batch partitioning and concurrent fan-out.
//!
//! An export batch is split into contiguous chunks of at most
//! [`MAX_RECORDS_PER_REQUEST`] records, and each chunk is delivered by its own
//! call. [`BatchExecutor`] drives those calls concurrently and joins all of
//! them before reporting.
//!
//! ## Example
//!
//! ```rust
//! use otlp_metrics_export::batch::{partition, MAX_RECORDS_PER_REQUEST};
//!
//! let chunks = partition((0..1200).collect::<Vec<u32>>(), MAX_RECORDS_PER_REQUEST);
//! let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
//! assert_eq!(sizes, vec![500, 500, 200]);
//! ```

mod chunker;
mod executor;

pub use chunker::{chunk_count, partition, MAX_RECORDS_PER_REQUEST};
pub use executor::{BatchExecutor, BatchResult};
