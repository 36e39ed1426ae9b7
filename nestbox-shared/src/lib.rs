//! Nestbox Shared - common types for the library, CLI and test fakes
//!
//! This crate contains the error taxonomy, the transport endpoint type and
//! the constants that every other crate in the workspace agrees on.

pub mod constants;
pub mod errors;
pub mod transport;

pub use errors::{NestboxError, NestboxResult};
pub use transport::Endpoint;
