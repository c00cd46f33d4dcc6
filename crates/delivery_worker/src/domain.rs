mod batch_outcome;
mod batch_service;
mod error;
mod transport;

pub use batch_outcome::*;
pub use batch_service::*;
pub use error::*;
pub use transport::*;
