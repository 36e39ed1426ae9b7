//! In-process fakes for nestbox tests.
//!
//! [`FakeHost`] understands the command lines nestbox emits and keeps a
//! small model of the containers on a host. [`FakeBuilder`] stands in for
//! `nix-build`. [`TestRuntime`] wires both into a runtime with an in-memory
//! store and trust registry and fast polling.

mod builder;
mod context;
mod host;

pub use builder::FakeBuilder;
pub use context::TestRuntime;
pub use host::{Call, FakeContainer, FakeHost};
