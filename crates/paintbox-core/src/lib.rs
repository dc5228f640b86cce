//! Wire envelope, configuration, and errors for Paintbox.

pub mod config;
pub mod error;
pub mod protocol;
