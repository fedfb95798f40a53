//! Sync engine and the domain mutation handlers built on it.
//!
//! Every handler applies its change locally first, then publishes the
//! equivalent remote operation, queueing it when the remote cannot take it.

mod audit;
mod cemeteries;
mod collections;
mod employees;
mod engine;
mod graves;
mod messages;
mod users;

pub use collections::Collections;
pub use engine::SyncEngine;
