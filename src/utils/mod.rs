//! Utilities Module
//!
//! Common utilities used across the crate.

mod cancel;
mod http;
mod json;
pub mod crypto;
pub mod logging;

pub use cancel::*;
pub use crypto::*;
pub use http::*;
pub use json::*;
