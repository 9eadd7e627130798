//! Scenario Harness
//!
//! Fires the canned prompts at the agent, classifies each outcome against
//! its expectation, persists the runs, and prints a report in the style of
//! the original fixture: a banner per scenario, then a summary table.

pub mod scenarios;

pub use scenarios::{find_scenario, test_scenarios, Expect, Scenario};

use colored::Colorize;
use tracing::info;

use crate::agent::executor::AgentExecutor;
use crate::rules::RuleId;
use crate::state::Database;
use crate::types::{AgentRun, RunEnd};

/// Classified outcome of one scenario run.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Allowed,
    Blocked { rule: Option<RuleId> },
    Error,
}

impl Outcome {
    pub fn from_end(end: &RunEnd) -> Self {
        match end {
            RunEnd::Completed => Outcome::Allowed,
            RunEnd::Blocked { rule, .. } => Outcome::Blocked { rule: *rule },
            RunEnd::Failed { .. } => Outcome::Error,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub run: AgentRun,
    pub outcome: Outcome,
    pub passed: bool,
}

/// Compare a finished run against the scenario's expectation.
///
/// A Blocked expectation is satisfied by any policy block; the matched rule
/// is reported alongside the expected one, but a differing rule ID still
/// counts as blocked. Errors never pass.
pub fn evaluate(scenario: Scenario, run: AgentRun) -> ScenarioResult {
    let outcome = Outcome::from_end(&run.end);
    let passed = match (&scenario.expect, &outcome) {
        (Expect::Allowed, Outcome::Allowed) => true,
        (Expect::Blocked(_), Outcome::Blocked { .. }) => true,
        _ => false,
    };

    ScenarioResult {
        scenario,
        run,
        outcome,
        passed,
    }
}

/// Run a set of scenarios sequentially, persisting each run.
pub async fn run_scenarios(
    executor: &AgentExecutor,
    db: Option<&Database>,
    scenarios: &[Scenario],
) -> Vec<ScenarioResult> {
    let mut results = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        print_banner(scenario.prompt);
        info!(scenario = scenario.name, "running scenario");

        let run = executor.invoke(scenario.prompt).await;
        if let Some(db) = db {
            if let Err(err) = db.insert_run(&run, Some(scenario.name)) {
                tracing::warn!(error = %err, "failed to persist run");
            }
        }

        let result = evaluate(*scenario, run);
        print_outcome(&result);
        results.push(result);
    }

    results
}

fn print_banner(prompt: &str) {
    let head: String = prompt.chars().take(50).collect();
    println!("\n{}", "=".repeat(60));
    println!("TESTING: {}...", head);
    println!("{}", "=".repeat(60));
}

fn print_outcome(result: &ScenarioResult) {
    match &result.run.end {
        RunEnd::Completed => {
            println!("{}: {}", "RESULT".green().bold(), result.run.final_text);
        }
        RunEnd::Blocked { rule, message } => {
            let rule_str = rule
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            println!("{}{}: {}", "BLOCKED".red().bold(), rule_str, message);
        }
        RunEnd::Failed { message } => {
            println!("{}: {}", "ERROR".yellow().bold(), message);
        }
    }

    for call in &result.run.tool_calls {
        let status = if call.error.is_some() { "failed".red() } else { "ok".green() };
        println!("  tool {} [{}] {}ms", call.name, status, call.duration_ms);
    }
}

/// Print the summary table and return whether every expectation held.
pub fn print_summary(results: &[ScenarioResult]) -> bool {
    println!("\n{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));

    let mut all_passed = true;
    for result in results {
        let expected = match result.scenario.expect {
            Expect::Allowed => "allow".to_string(),
            Expect::Blocked(rule) => format!("block {}", rule),
        };
        let observed = match &result.outcome {
            Outcome::Allowed => "allowed".to_string(),
            Outcome::Blocked { rule: Some(r) } => format!("blocked {}", r),
            Outcome::Blocked { rule: None } => "blocked".to_string(),
            Outcome::Error => "error".to_string(),
        };
        let verdict = if result.passed {
            "PASS".green().bold()
        } else {
            all_passed = false;
            "FAIL".red().bold()
        };

        println!(
            "  {} {:<24} expected: {:<14} observed: {}",
            verdict, result.scenario.name, expected, observed
        );
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!("\n{}/{} scenarios behaved as expected", passed, results.len());

    all_passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{PROMPT_DISCLOSURE, PROMPT_INJECTION};
    use crate::types::TokenUsage;

    fn run_with(end: RunEnd) -> AgentRun {
        AgentRun {
            id: "run".to_string(),
            prompt: "p".to_string(),
            final_text: String::new(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            end,
            started_at: String::new(),
            finished_at: String::new(),
        }
    }

    #[test]
    fn test_blocked_expectation_matches_any_block() {
        let scenario = find_scenario("injection").unwrap();
        let result = evaluate(
            scenario,
            run_with(RunEnd::Blocked {
                rule: Some(PROMPT_INJECTION),
                message: "blocked".to_string(),
            }),
        );
        assert!(result.passed);

        // Differing rule ID still counts as blocked.
        let result = evaluate(
            scenario,
            run_with(RunEnd::Blocked {
                rule: Some(PROMPT_DISCLOSURE),
                message: "blocked".to_string(),
            }),
        );
        assert!(result.passed);
    }

    #[test]
    fn test_allowed_expectation_fails_when_blocked() {
        let scenario = find_scenario("safe_balance_query").unwrap();
        let result = evaluate(
            scenario,
            run_with(RunEnd::Blocked {
                rule: None,
                message: "overblocked".to_string(),
            }),
        );
        assert!(!result.passed);
        assert_eq!(result.outcome, Outcome::Blocked { rule: None });
    }

    #[test]
    fn test_errors_never_pass() {
        for name in ["injection", "safe_balance_query"] {
            let scenario = find_scenario(name).unwrap();
            let result = evaluate(
                scenario,
                run_with(RunEnd::Failed {
                    message: "timeout".to_string(),
                }),
            );
            assert!(!result.passed, "scenario {name} passed on error");
        }
    }

    #[test]
    fn test_completed_run_passes_safe_scenario() {
        let scenario = find_scenario("safe_balance_query").unwrap();
        let result = evaluate(scenario, run_with(RunEnd::Completed));
        assert!(result.passed);
        assert_eq!(result.outcome, Outcome::Allowed);
    }
}
