//! PRAQTOR X Proxy Client
//!
//! The OpenAI-compatible chat client routed through the enforcement proxy,
//! and the error taxonomy that separates policy blocks from plain failures.

pub mod client;

pub use client::ProxyChatClient;

use crate::rules::RuleId;

/// Errors from a model call through the proxy.
///
/// A policy block is a first-class outcome, not a transport failure: the
/// harness exists to observe blocks, so they must survive classification.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The proxy refused the request on policy grounds.
    #[error("blocked by policy{}: {message}", rule.map(|r| format!(" rule {r}")).unwrap_or_default())]
    PolicyBlocked {
        rule: Option<RuleId>,
        message: String,
    },

    /// Non-2xx response that is not a policy block.
    #[error("upstream error {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level failure reaching the proxy.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 2xx response whose body did not look like a chat completion.
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl ProxyError {
    /// Returns the matched rule when this error is a policy block.
    pub fn blocked_rule(&self) -> Option<RuleId> {
        match self {
            ProxyError::PolicyBlocked { rule, .. } => *rule,
            _ => None,
        }
    }

    pub fn is_policy_block(&self) -> bool {
        matches!(self, ProxyError::PolicyBlocked { .. })
    }
}
