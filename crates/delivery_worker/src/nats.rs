mod queue_record_processor;

pub use queue_record_processor::*;
