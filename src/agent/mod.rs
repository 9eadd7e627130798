//! Agent Module
//!
//! The demo agent's tool set, system prompt, message assembly, and the
//! run-to-completion executor that drives tool-calling rounds.

pub mod context;
pub mod executor;
pub mod system_prompt;
pub mod tools;
