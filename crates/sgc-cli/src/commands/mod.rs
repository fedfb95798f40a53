pub mod common;
pub mod config;
pub mod messages;
pub mod queue;
pub mod records;
pub mod sync;
pub mod users;
