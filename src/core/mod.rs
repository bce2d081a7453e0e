//! Core traits, constants, and error types.

pub mod constants;
pub mod error;
pub mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
