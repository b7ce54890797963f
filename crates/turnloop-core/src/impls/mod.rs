//! Implementations of the ports.

pub mod strategies;

pub use self::strategies::{CancelOnError, ThrowOnError};
