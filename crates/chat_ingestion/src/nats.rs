mod envelope_producer;
mod ingress_service;

pub use envelope_producer::*;
pub use ingress_service::*;
