pub mod domain;
pub mod ingress_worker;
pub mod nats;

pub use domain::*;
pub use ingress_worker::*;
pub use nats::*;
