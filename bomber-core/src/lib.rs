//! Data model shared by the bomber engine and anything consuming its results.
mod config;
mod constants;
mod error;
mod outcome;
mod profile;
mod stats;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use outcome::*;
pub use profile::*;
pub use stats::*;
