use thiserror::Error;

/// Result alias for heap operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Default granularity of growth calls, in bytes. Every request to the
/// growth primitive is rounded up to a whole number of these units.
pub const DEFAULT_GROWTH_UNIT: usize = 2048;

/// Failures a heap operation reports back to the caller.
///
/// Only recoverable conditions live here. Detected state corruption
/// (free-list disorder, double releases, growth-boundary mismatches)
/// panics instead, since continuing would risk further silent damage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("zero-size allocation request")]
    ZeroSize,

    #[error("heap exhausted: requested {requested} bytes, arena holds {arena_bytes} bytes")]
    OutOfMemory { requested: usize, arena_bytes: usize },
}

/// What `release` does with the freed block's neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescePolicy {
    /// Merge address-adjacent free blocks on every release. Keeps
    /// fragmentation down and is the default.
    #[default]
    OnRelease,
    /// Leave neighbors unmerged. Freed blocks are only reused whole, so
    /// fragmentation accumulates; useful for reproducing allocation
    /// patterns of allocators that defer merging.
    Never,
}

/// Tuning knobs for a [`Heap`](crate::Heap). All constructors are const
/// so a configured heap can live in a `static`.
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Granularity every growth request is rounded up to, in bytes.
    /// Must be a multiple of the block header size and large enough to
    /// hold at least two headers.
    pub growth_unit: usize,
    /// Coalescing behavior on release.
    pub coalesce: CoalescePolicy,
}

impl HeapConfig {
    pub const fn new() -> Self {
        Self {
            growth_unit: DEFAULT_GROWTH_UNIT,
            coalesce: CoalescePolicy::OnRelease,
        }
    }

    pub const fn with_growth_unit(mut self, unit: usize) -> Self {
        self.growth_unit = unit;
        self
    }

    pub const fn with_coalesce(mut self, policy: CoalescePolicy) -> Self {
        self.coalesce = policy;
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of arena occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Total bytes obtained from the growth primitive so far.
    pub arena_bytes: usize,
    /// Calls made to the growth primitive, initialization included.
    pub growth_calls: u64,
    /// Blocks currently handed out.
    pub used_blocks: usize,
    /// Blocks currently on the free list, sentinel excluded.
    pub free_blocks: usize,
    /// Payload bytes reusable without growing the arena.
    pub free_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builders() {
        let config = HeapConfig::new()
            .with_growth_unit(4096)
            .with_coalesce(CoalescePolicy::Never);

        assert_eq!(config.growth_unit, 4096);
        assert_eq!(config.coalesce, CoalescePolicy::Never);
    }

    #[test]
    fn exhaustion_reports_both_sizes() {
        let err = AllocError::OutOfMemory {
            requested: 4096,
            arena_bytes: 2048,
        };
        assert_eq!(
            err.to_string(),
            "heap exhausted: requested 4096 bytes, arena holds 2048 bytes"
        );
    }
}
