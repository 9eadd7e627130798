//! PRAQTOR X Rule Identifiers
//!
//! Typed model of the rule IDs the proxy enforces. Behavior rules (H/A/B/C
//! prefixes) categorize tool side effects; prompt policy rules (P prefix)
//! categorize adversarial prompt patterns. The matching engine lives in the
//! proxy; this module only names the rules and parses them out of responses.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which side of the dual protection a rule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Tool/side-effect rules: H (financial), A (data/filesystem),
    /// B (execution), C (network).
    Behavior,
    /// Prompt policy rules: P (injection, disclosure, impersonation, ...).
    Prompt,
}

/// A parsed rule identifier such as `H1-01` or `P10-08`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RuleId {
    pub category: char,
    pub class: u8,
    pub ordinal: u8,
}

impl RuleId {
    pub const fn new(category: char, class: u8, ordinal: u8) -> Self {
        RuleId {
            category,
            class,
            ordinal,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self.category {
            'P' => RuleKind::Prompt,
            _ => RuleKind::Behavior,
        }
    }

    /// Human-readable label for the rules the harness exercises, if known.
    pub fn label(&self) -> Option<&'static str> {
        KNOWN_RULES
            .iter()
            .find(|(id, _)| id == self)
            .map(|(_, label)| *label)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{:02}", self.category, self.class, self.ordinal)
    }
}

impl FromStr for RuleId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = rule_id_regex()
            .captures(s.trim())
            .filter(|c| c.get(0).map(|m| m.as_str().len()) == Some(s.trim().len()))
            .ok_or_else(|| anyhow::anyhow!("not a rule identifier: {s:?}"))?;

        Ok(RuleId {
            category: caps[1].chars().next().unwrap(),
            class: caps[2].parse()?,
            ordinal: caps[3].parse()?,
        })
    }
}

impl Serialize for RuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Rules named by the test agent ───────────────────────────────

/// H1-01: Financial Transaction (transfer_funds).
pub const FINANCIAL_TRANSACTION: RuleId = RuleId::new('H', 1, 1);
/// A2-03: Database Access (get_account_balance, execute_sql).
pub const DATABASE_ACCESS: RuleId = RuleId::new('A', 2, 3);
/// C3-01: External HTTP (send_notification).
pub const EXTERNAL_HTTP: RuleId = RuleId::new('C', 3, 1);
/// A1-02: File System Write (generate_report).
pub const FILESYSTEM_WRITE: RuleId = RuleId::new('A', 1, 2);
/// B2-01: Shell Command Execution (run_system_command).
pub const SHELL_EXECUTION: RuleId = RuleId::new('B', 2, 1);

/// P1-01: Injection attack.
pub const PROMPT_INJECTION: RuleId = RuleId::new('P', 1, 1);
/// P6-01: Auth bypass.
pub const AUTH_BYPASS: RuleId = RuleId::new('P', 6, 1);
/// P3-01: System prompt disclosure.
pub const PROMPT_DISCLOSURE: RuleId = RuleId::new('P', 3, 1);
/// P10-08: Authority impersonation.
pub const AUTHORITY_IMPERSONATION: RuleId = RuleId::new('P', 10, 8);

const KNOWN_RULES: &[(RuleId, &str)] = &[
    (FINANCIAL_TRANSACTION, "Financial Transaction"),
    (DATABASE_ACCESS, "Database Access"),
    (EXTERNAL_HTTP, "External HTTP"),
    (FILESYSTEM_WRITE, "File System Write"),
    (SHELL_EXECUTION, "Shell Command Execution"),
    (PROMPT_INJECTION, "Injection Attack"),
    (AUTH_BYPASS, "Auth Bypass"),
    (PROMPT_DISCLOSURE, "System Prompt Disclosure"),
    (AUTHORITY_IMPERSONATION, "Authority Impersonation"),
];

fn rule_id_regex() -> Regex {
    // Category letter, class digits, two-digit ordinal. The proxy zero-pads
    // the ordinal (H1-01, P10-08), so require exactly two digits there.
    Regex::new(r"\b([HABCP])(\d{1,2})-(\d{2})\b").expect("rule id regex")
}

/// Scan free text (typically a proxy error body) for rule identifiers.
pub fn extract_rule_ids(text: &str) -> Vec<RuleId> {
    let mut found = Vec::new();
    for caps in rule_id_regex().captures_iter(text) {
        let id = RuleId {
            category: caps[1].chars().next().unwrap(),
            class: caps[2].parse().unwrap_or(0),
            ordinal: caps[3].parse().unwrap_or(0),
        };
        if !found.contains(&id) {
            found.push(id);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let id: RuleId = "H1-01".parse().unwrap();
        assert_eq!(id, FINANCIAL_TRANSACTION);
        assert_eq!(id.to_string(), "H1-01");

        let id: RuleId = "P10-08".parse().unwrap();
        assert_eq!(id, AUTHORITY_IMPERSONATION);
        assert_eq!(id.to_string(), "P10-08");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<RuleId>().is_err());
        assert!("H1".parse::<RuleId>().is_err());
        assert!("X1-01".parse::<RuleId>().is_err());
        assert!("H1-01 extra".parse::<RuleId>().is_err());
    }

    #[test]
    fn test_kind_split() {
        assert_eq!(FINANCIAL_TRANSACTION.kind(), RuleKind::Behavior);
        assert_eq!(SHELL_EXECUTION.kind(), RuleKind::Behavior);
        assert_eq!(PROMPT_INJECTION.kind(), RuleKind::Prompt);
    }

    #[test]
    fn test_extract_from_error_body() {
        let body = r#"{"error":{"message":"Request blocked by PRAQTOR X: rule P1-01 (Injection Attack) matched"}}"#;
        assert_eq!(extract_rule_ids(body), vec![PROMPT_INJECTION]);
    }

    #[test]
    fn test_extract_dedupes_and_preserves_order() {
        let text = "violations: A2-03, B2-01, A2-03";
        assert_eq!(extract_rule_ids(text), vec![DATABASE_ACCESS, SHELL_EXECUTION]);
    }

    #[test]
    fn test_known_rule_labels() {
        assert_eq!(DATABASE_ACCESS.label(), Some("Database Access"));
        assert_eq!(RuleId::new('H', 9, 9).label(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&AUTH_BYPASS).unwrap();
        assert_eq!(json, "\"P6-01\"");
        let back: RuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AUTH_BYPASS);
    }
}
