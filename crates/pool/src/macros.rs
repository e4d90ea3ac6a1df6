//! Public macros for nebula-pool crate

/// Build a [`PoolConfig`](crate::PoolConfig) for a chunk capacity, overriding
/// selected fields
///
/// `max_alloc` defaults to the capacity, so only fields that differ from
/// [`PoolConfig::new`](crate::PoolConfig::new) need to be named.
///
/// # Examples
/// ```
/// use nebula_pool::pool_config;
///
/// let config = pool_config!(1024, max_alloc: 256, max_failed: 2);
/// assert_eq!(config.chunk_capacity, 1024);
/// assert_eq!(config.max_alloc, 256);
/// assert!(config.validate().is_ok());
/// ```
#[macro_export]
macro_rules! pool_config {
    ($capacity:expr $(, $field:ident: $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut config = $crate::PoolConfig::new($capacity);
        $(config.$field = $value;)*
        config
    }};
}

/// Allocate `size` bytes from a pool, yielding the region's start pointer
///
/// The two-argument form falls back to `$default` instead of propagating the
/// error.
///
/// # Examples
/// ```
/// use nebula_pool::{MemoryPool, pool_alloc};
///
/// # fn main() -> nebula_pool::PoolResult<()> {
/// let mut pool = MemoryPool::new()?;
/// let ptr = pool_alloc!(pool, 64)?;
/// assert!(!ptr.as_ptr().is_null());
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! pool_alloc {
    ($pool:expr, $size:expr) => {
        $pool.alloc($size).map(|region| region.cast::<u8>())
    };

    ($pool:expr, $size:expr, $default:expr) => {
        $pool
            .alloc($size)
            .map(|region| region.cast::<u8>())
            .unwrap_or_else(|_| $default)
    };
}
