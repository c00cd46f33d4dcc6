mod envelope_builder;
mod ingestion_service;

pub use envelope_builder::*;
pub use ingestion_service::*;
