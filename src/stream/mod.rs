//! Streaming response pipeline: chunks → records → fragments.

pub mod aggregator;
pub mod decoder;

pub use aggregator::{DeltaAggregator, ServiceUsage};
pub use decoder::decode_stream;
