//! Pool statistics
//!
//! Counters are bumped inline by the pool (no atomics: pools are
//! single-threaded) and copied out as a [`PoolStats`] snapshot.

use core::fmt;

/// Cumulative event counters kept by a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolCounters {
    pub(crate) small_allocations: usize,
    pub(crate) large_allocations: usize,
    pub(crate) large_releases: usize,
    pub(crate) chunk_growths: usize,
    pub(crate) bump_probes: usize,
    pub(crate) bump_misses: usize,
    pub(crate) resets: usize,
    pub(crate) oom_failures: usize,
}

/// Point-in-time view of a pool's structure and history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Chunks in the chain, head included
    pub chunk_count: usize,
    /// Index of the chunk small allocations start from
    pub current_index: usize,
    /// Live large blocks
    pub large_count: usize,
    /// Bytes handed out from chunks
    pub chunk_bytes_used: usize,
    /// Bytes still free across all chunks
    pub chunk_bytes_free: usize,
    /// Bytes held by live large blocks
    pub large_bytes: usize,

    /// Small requests served from a chunk
    pub small_allocations: usize,
    /// Large blocks ever allocated
    pub large_allocations: usize,
    /// Large blocks released individually through `free_large`
    pub large_releases: usize,
    /// Chunks appended after creation
    pub chunk_growths: usize,
    /// Chunks examined by small allocations
    pub bump_probes: usize,
    /// Probes that did not fit
    pub bump_misses: usize,
    /// Calls to `reset`
    pub resets: usize,
    /// Requests that failed because the backing allocator refused
    pub oom_failures: usize,
}

impl PoolStats {
    pub(crate) fn with_counters(mut self, counters: &PoolCounters) -> Self {
        self.small_allocations = counters.small_allocations;
        self.large_allocations = counters.large_allocations;
        self.large_releases = counters.large_releases;
        self.chunk_growths = counters.chunk_growths;
        self.bump_probes = counters.bump_probes;
        self.bump_misses = counters.bump_misses;
        self.resets = counters.resets;
        self.oom_failures = counters.oom_failures;
        self
    }

    /// Share of probes that missed, 0.0 when nothing was probed
    pub fn miss_ratio(&self) -> f64 {
        if self.bump_probes == 0 {
            0.0
        } else {
            self.bump_misses as f64 / self.bump_probes as f64
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunks: {} (current #{}), used: {} bytes, free: {} bytes, large: {} ({} bytes)",
            self.chunk_count,
            self.current_index,
            self.chunk_bytes_used,
            self.chunk_bytes_free,
            self.large_count,
            self.large_bytes,
        )?;

        if self.bump_probes > 0 {
            write!(f, ", miss ratio: {:.1}%", self.miss_ratio() * 100.0)?;
        }

        Ok(())
    }
}
