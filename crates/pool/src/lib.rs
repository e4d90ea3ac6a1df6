//! # nebula-pool
//!
//! Request-scoped memory pool for the Nebula workflow automation ecosystem.
//!
//! A pool hands out raw byte regions by bumping a cursor through a chain of
//! fixed-size chunks and releases them all at once on [`MemoryPool::reset`] or
//! when dropped. Requests larger than the configured threshold get dedicated
//! blocks that can also be released early with [`MemoryPool::free_large`].
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_pool::prelude::*;
//!
//! # fn main() -> PoolResult<()> {
//! let mut pool = MemoryPool::with_config(PoolConfig::new(4096))?;
//!
//! // small requests are carved from the chunk chain
//! let header = pool.alloc(128)?;
//! assert_eq!(header.len(), 128);
//!
//! // large requests get a block of their own
//! let body = pool.alloc(64 * 1024)?;
//! pool.free_large(body.cast())?;
//!
//! // everything goes back in one step
//! pool.reset();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured `tracing` events for pool lifecycle,
//!   growth and misuse
//!
//! ## Architecture
//!
//! - [`error`]: standalone error type built on `thiserror`
//! - [`config`]: per-pool sizing and miss-threshold policy
//! - [`backing`]: where chunk and large-block memory comes from
//! - [`pool`]: the chunk chain, the large-block list and the pool itself
//! - [`stats`]: structural and counter snapshots

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Precision loss in usize -> f64 casts is acceptable for stats
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::return_self_not_must_use)]

// Error types
pub mod error;

pub mod backing;
pub mod config;
pub mod pool;
pub mod stats;

mod macros;

pub use backing::{BackingAllocator, SystemBacking, TrackedBacking};
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult, Result};
pub use pool::{BLOCK_ALIGN, Chunk, LargeBlock, MemoryPool};
pub use stats::PoolStats;

/// Common imports for pool users
pub mod prelude {
    pub use crate::backing::{BackingAllocator, SystemBacking, TrackedBacking};
    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::pool::MemoryPool;
    pub use crate::stats::PoolStats;
}
