use crate::{NumberingScheme, RetryPolicy};

/// Largest batch a single allocation may request unless configured otherwise.
pub const DEFAULT_MAX_BATCH: u32 = 20;

/// Tunables for an [`Allocator`](crate::Allocator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Upper bound on `count` per call; requests above it fail with
    /// [`crate::Error::InvalidQuantity`].
    pub max_batch: u32,
    /// Whether sequences restart each year.
    pub scheme: NumberingScheme,
    /// Applied to reservation races and to transient store or ledger
    /// failures.
    pub retry: RetryPolicy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            scheme: NumberingScheme::default(),
            retry: RetryPolicy::default(),
        }
    }
}
