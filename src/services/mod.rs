pub mod activity;
pub mod documents;
pub mod history;
pub mod rate_limit;
pub mod recommendation;
pub mod showcase;
pub mod store;
pub mod transient;
