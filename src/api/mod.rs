//! Client for the task management REST backend.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod types;
