//! Common types for the drive credential manager

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
