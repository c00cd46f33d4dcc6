mod delivery;
mod envelope;
mod result;

pub use delivery::*;
pub use envelope::*;
pub use result::*;
