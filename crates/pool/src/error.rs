//! Standalone error types for nebula-pool
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use core::alloc::Layout;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Types
// ============================================================================

/// Memory pool errors
///
/// Every failure is single-attempt: the pool never retries internally and
/// never leaves its chunk chain or large-block list half-updated.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The backing memory system refused a chunk or large-block request
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    /// `free_large` was handed a pointer this pool does not currently own
    #[error("Pointer {addr:#x} is not a live large block of this pool")]
    UnknownLargeBlock { addr: usize },
}

impl PoolError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "POOL:ALLOC:FAILED",
            Self::InvalidConfig { .. } => "POOL:CONFIG:INVALID",
            Self::UnknownLargeBlock { .. } => "POOL:LARGE:UNKNOWN",
        }
    }

    /// True when the backing memory system ran out of memory
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// True when the caller violated the pool's ownership contract
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::UnknownLargeBlock { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "pool allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create allocation failed error from layout
    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create unknown large block error
    pub fn unknown_large_block(addr: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(addr, "free_large on a pointer the pool does not own");

        Self::UnknownLargeBlock { addr }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

/// Generic result type alias
pub type Result<T> = PoolResult<T>;
