pub mod constants;
pub mod layout;
pub(crate) mod lock;
pub mod options;
pub mod types;

pub(crate) mod core;
pub use core::{Collaborators, NestboxRuntime};
pub(crate) use core::RuntimeInner;
