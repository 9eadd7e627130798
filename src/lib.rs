//! PRAQTOR X Test Agent -- TC-003 Financial Transfer Agent
//!
//! A demonstration agent that routes its model calls through the PRAQTOR X
//! policy-enforcement proxy and exercises it with canned adversarial prompts.

pub mod types;
pub mod config;
pub mod rules;
pub mod proxy;
pub mod agent;
pub mod harness;
pub mod state;
