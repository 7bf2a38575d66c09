pub mod change_tracker;
pub mod file_filter;
pub mod indexer;
pub mod query;
