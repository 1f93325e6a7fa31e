//! Bulk product import: feed parsing, category resolution, duplicate
//! detection, image rehosting, and the batch pipeline that ties them
//! together.

pub mod dedup;
pub mod feed;
pub mod normalize;
pub mod pipeline;
pub mod rehost;
pub mod report;

mod retry;

pub use dedup::{DedupIndex, DuplicateMatch, DuplicateReason};
pub use feed::{FeedError, FeedFormat, FeedRecord};
pub use normalize::{resolve_record, ResolveSkip};
pub use pipeline::{CancelFlag, ImportMode, ImportOptions, ImportPipeline};
pub use rehost::{
    optimized_url, HttpImageRehoster, ImageRehoster, NoopImageRehoster, RehostError, RehostOutcome,
};
pub use report::{FieldChange, ImportReport, RowOutcome, RowStatus};
