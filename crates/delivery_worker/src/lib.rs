pub mod delivery_worker;
pub mod domain;
pub mod nats;
pub mod realtime;

pub use delivery_worker::*;
pub use domain::*;
pub use nats::*;
pub use realtime::*;
