//! Shared types for the WeCom service workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
