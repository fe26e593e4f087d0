//! Session results: accumulation, persistence and console summary

mod aggregator;
mod writer;

pub use aggregator::ResultAggregator;
pub use writer::write_json_atomic;
