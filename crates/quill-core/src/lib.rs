//! quill-core: Shared types, configuration, and error handling for the Quill scenario tools.
//!
//! This crate provides the foundational types used across all Quill components:
//! - Game, Location (node) and Exit (edge) types for the scenario graph
//! - Ingestion job types for the document import pipeline
//! - The portable scenario document used by export/import
//! - Editor events and the notifier that delivers them
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod types;

pub use error::CoreError;
pub use types::{
    Exit, ExitDraft, ExitId, ExitPatch, ExitType, Game, GameId, GameInfo, GamePatch, GameStatus,
    JobId, JobStatus, JobSnapshot, JobTicket, Location, LocationDraft, LocationId, LocationPatch,
    SourceDocument,
};
