//! Quill API: client for the narrative-game admin backend.
//!
//! Every read and write of the scenario graph flows through the
//! [`AdminBackend`] trait. [`ApiClient`] speaks REST; [`InMemoryBackend`]
//! reproduces the backend's behavior in-process.

pub mod backend;
pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;

pub use backend::AdminBackend;
pub use client::{ApiClient, ApiConfig, ApiError};
pub use memory::InMemoryBackend;
