//! Persistent Run Log
//!
//! SQLite-backed record of every harness run and the tool calls the model
//! made along the way, so blocked/allowed history is inspectable after the
//! fact.

pub mod database;
pub mod schema;

pub use database::{Database, RunRecord};
