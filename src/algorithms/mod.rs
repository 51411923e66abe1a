pub mod aggregator;
pub mod allocator;
pub mod fingerprint;
pub mod segment;

pub use aggregator::InterestAggregator;
pub use allocator::{merge_bands, plan_bands, AllocationInput, Band, BandQuery};
pub use fingerprint::fingerprint;
pub use segment::Segment;
