pub mod analyze;
pub mod count;
pub mod help;
pub mod latency;
pub mod summary;
