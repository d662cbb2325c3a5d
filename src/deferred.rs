// =============================================================================
// deferred.rs - FETCH IT WHEN SOMEONE ASKS, AND ONLY ONCE
// =============================================================================
//
// Some listing pages don't carry every field. Texas, for one, gives us a
// docket number and a PDF link per row, and hides the case style on a
// per-case detail page. Fetching every detail page up front would cost one
// request per row whether anybody reads the name or not.
//
// `DeferredList` holds the seeds (detail URLs) and computes each element on
// first access. A computed element is cached in its own cell and is never
// fetched again. Access is sequential: resolving the whole list walks it
// front to back, one request at a time.
// =============================================================================

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ScrapeError;

/// How to turn one seed into one value.
#[async_trait(?Send)]
pub trait DeferredFetch {
    type Output;

    async fn fetch(&self, seed: &str) -> Result<Self::Output, ScrapeError>;
}

pub struct DeferredList<F: DeferredFetch> {
    seeds: Vec<String>,
    cells: Vec<OnceCell<F::Output>>,
    fetcher: F,
}

impl<F: DeferredFetch> DeferredList<F> {
    pub fn new(seeds: Vec<String>, fetcher: F) -> Self {
        let cells = seeds.iter().map(|_| OnceCell::new()).collect();
        Self {
            seeds,
            cells,
            fetcher,
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Whether element `index` has already been fetched.
    pub fn is_resolved(&self, index: usize) -> bool {
        self.cells.get(index).is_some_and(|cell| cell.initialized())
    }

    /// Element `index`, fetching it on first access.
    ///
    /// A failed fetch leaves the cell empty, so a later call tries again.
    pub async fn get(&self, index: usize) -> Result<&F::Output, ScrapeError> {
        let cell = self.cells.get(index).ok_or(ScrapeError::IndexOutOfRange {
            index,
            len: self.seeds.len(),
        })?;
        let seed = &self.seeds[index];
        cell.get_or_try_init(|| async {
            debug!(index, seed = seed.as_str(), "Resolving deferred element");
            self.fetcher.fetch(seed).await
        })
        .await
    }

    /// Every element in order, as a stream. Nothing is fetched until the
    /// stream is polled.
    pub fn stream(&self) -> impl Stream<Item = Result<&F::Output, ScrapeError>> + '_ {
        stream::iter(0..self.len()).then(move |index| self.get(index))
    }
}

impl<F> DeferredList<F>
where
    F: DeferredFetch,
    F::Output: Clone,
{
    /// Resolve the whole list front to back. Stops at the first failure.
    pub async fn resolve_all(&self) -> Result<Vec<F::Output>, ScrapeError> {
        self.stream().map_ok(|value| value.clone()).try_collect().await
    }
}
