use async_trait::async_trait;

use crate::domain::{Batch, FetchUnit, SourceKind};
use crate::errors::FetchError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifies this adapter
    fn kind(&self) -> SourceKind;

    /// Units to fetch in one run, in the adapter's own priority order
    fn plan(&self, per_source_limit: usize) -> Vec<FetchUnit>;

    /// Fetch and normalize a single unit. One attempt; retries belong to the caller.
    async fn fetch_unit(&self, unit: &FetchUnit) -> Result<Batch, FetchError>;
}
