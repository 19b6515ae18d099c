// Trait seam for the remote photo index.
//
// PhotoSearcher is the only I/O the pipeline performs. Production wires in
// FlickrSearcher; tests use the mocks in `testing` so no network is needed.

use anyhow::Result;
use async_trait::async_trait;

use photowalk_common::{PhotoCandidate, Position};

#[async_trait]
pub trait PhotoSearcher: Send + Sync {
    /// Photos near `position`, in the index's own order. Candidates may lack
    /// geo data; the pipeline filters those out.
    async fn search(&self, position: Position) -> Result<Vec<PhotoCandidate>>;
}

/// Searcher that never finds anything. Used for dry runs without credentials.
pub struct NoopSearcher;

#[async_trait]
impl PhotoSearcher for NoopSearcher {
    async fn search(&self, _position: Position) -> Result<Vec<PhotoCandidate>> {
        Ok(Vec::new())
    }
}
