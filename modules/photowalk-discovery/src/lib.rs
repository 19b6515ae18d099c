//! Geo-triggered photo discovery.
//!
//! Position reports flow through a movement gate; when the walker has moved
//! far enough, nearby photos are fetched, ranked by proximity, and the
//! nearest one not yet shown is prepended to the session's list. Every
//! gate-open report publishes a full snapshot of that list to subscribers.

pub mod accumulator;
pub mod gate;
pub mod pipeline;
pub mod ranker;
pub mod searcher;
pub mod selector;
pub mod session;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use accumulator::Accumulator;
pub use pipeline::{
    DiscoveryPipeline, Phase, PipelineConfig, PipelineHandle, PositionReporter, ReportError,
    SessionState, SessionStats, SnapshotSubscriber, StepOutcome,
};
pub use searcher::FlickrSearcher;
pub use session::DiscoverySession;
pub use source::ReplaySource;
pub use traits::{NoopSearcher, PhotoSearcher};
