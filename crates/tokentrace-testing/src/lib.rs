//! Testing infrastructure for tokentrace integration tests.
//!
//! This crate provides utilities for writing robust integration tests:
//! - `TranscriptBuilder`: Fluent JSONL transcript fixtures
//! - `TestStore`: Operation store fixtures
//! - `TestWorld`: Isolated home with a transcripts root
//! - `assertions`: Bundle-level assertions

pub mod assertions;
pub mod fixtures;
pub mod store;
pub mod world;

pub use fixtures::{TranscriptBuilder, uuid_for};
pub use store::TestStore;
pub use world::TestWorld;
