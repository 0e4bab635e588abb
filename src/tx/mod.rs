//! Transaction Module
//!
//! Handles transaction building, signature assembly and broadcasting.

mod broadcaster;
mod builder;
mod replay_protection;
mod signer;

pub use broadcaster::*;
pub use builder::*;
pub use replay_protection::*;
pub use signer::*;
