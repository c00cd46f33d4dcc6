mod client;
mod region;
mod signer;

pub use client::*;
pub use region::*;
pub use signer::*;
