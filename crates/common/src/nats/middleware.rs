mod consumer_logging;
mod consumer_tracing;
mod consumer_types;
mod publish_logging;
mod publish_tracing;
mod publisher;
mod types;

pub use self::consumer_logging::*;
pub use self::consumer_tracing::*;
pub use self::consumer_types::*;
pub use self::publish_logging::*;
pub use self::publish_tracing::*;
pub use self::publisher::*;
pub use self::types::*;
