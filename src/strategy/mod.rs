//! Execution Strategies
//!
//! Streams are single-threaded and pull-based. For batches of documents or
//! queries, the parallel strategy fans independent pipelines out over a
//! Rayon thread pool.

pub mod parallel;

pub use parallel::{render_parallel, select_map, select_parallel};
