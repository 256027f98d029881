//! Lazy resolution of per-item category metadata.
//!
//! [`ResolutionCache`] is the process-wide record of what is already known;
//! [`BackoffPoller`] batches the ids that are not, asks the metadata
//! service for them on a backoff timer, and reports each outcome once.

mod cache;
mod poller;

pub use cache::{CategoryInfo, ResolutionCache, SnapshotError, IN_PROGRESS_SENTINEL};
pub use poller::{
    BackoffPoller, LookupStatus, MetadataSource, PollReport, PollerConfig, ResolutionSink,
};
