// engine.rs — Rule evaluation.
//
// The PolicyEngine decides which rules of a rule set apply to a request.
// A rule applies when every one of its conditions is satisfied:
//
// 1. No <conditions> (or an empty block) → applies
// 2. <identity> → the requester matches some alternative
// 3. <sphere> → the request's current sphere equals the sphere value
// 4. <validity> → the request time lies in some interval
// 5. <false-condition> → never satisfied
// 6. Any other extension condition → not satisfied
//
// Conditions the engine does not understand count as false, so an unknown
// vendor condition can only ever narrow a rule, never widen it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conditions::ConditionItem;
use crate::container::Kind;
use crate::extensions::FalseCondition;
use crate::rule::Rule;
use crate::ruleset::RuleSet;

/// The requester and context a rule set is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Requester identifier, e.g. "sip:alice@example.com".
    pub identity: String,
    /// The presentity's current sphere, if known.
    pub sphere: Option<String>,
    /// Evaluation time.
    pub at: DateTime<Utc>,
}

impl PolicyRequest {
    /// A request evaluated now, with no current sphere.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            sphere: None,
            at: Utc::now(),
        }
    }

    pub fn with_sphere(mut self, sphere: impl Into<String>) -> Self {
        self.sphere = Some(sphere.into());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// One check the engine made while evaluating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Id of the rule being evaluated.
    pub rule: String,
    /// Which check was performed (e.g. "identity", "validity").
    pub check: String,
    /// The outcome of the check (e.g. "matched", "failed: ...").
    pub outcome: String,
    /// Whether this step decided the rule.
    pub terminal: bool,
}

/// The applicable rules together with every step taken to find them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationTrace {
    /// Ids of the applicable rules, in document order.
    pub applicable: Vec<String>,
    pub steps: Vec<EvaluationStep>,
}

/// Evaluates requests against a loaded rule set.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    ruleset: RuleSet,
}

impl PolicyEngine {
    pub fn new(ruleset: RuleSet) -> Self {
        Self { ruleset }
    }

    /// Replace the rule set.
    pub fn load_ruleset(&mut self, ruleset: RuleSet) {
        self.ruleset = ruleset;
    }

    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    /// Ids of the rules that apply to `request`, in document order.
    pub fn evaluate(&self, request: &PolicyRequest) -> Vec<String> {
        self.applicable_rules(request)
            .into_iter()
            .map(|rule| rule.id().to_string())
            .collect()
    }

    /// The rules that apply to `request`, in document order.
    pub fn applicable_rules(&self, request: &PolicyRequest) -> Vec<&Rule> {
        self.ruleset
            .iter()
            .filter(|rule| evaluate_rule(rule, request, &mut |_: EvaluationStep| {}))
            .collect()
    }

    /// Same as `evaluate()`, recording every check.
    pub fn evaluate_with_trace(&self, request: &PolicyRequest) -> EvaluationTrace {
        let mut steps = Vec::new();
        let mut applicable = Vec::new();
        for rule in &self.ruleset {
            if evaluate_rule(rule, request, &mut |step: EvaluationStep| steps.push(step)) {
                applicable.push(rule.id().to_string());
            }
        }
        EvaluationTrace { applicable, steps }
    }
}

/// Evaluate one rule, reporting each check to `record`. Stops at the first
/// condition that is not satisfied.
fn evaluate_rule(
    rule: &Rule,
    request: &PolicyRequest,
    record: &mut dyn FnMut(EvaluationStep),
) -> bool {
    let step = |check: &str, outcome: String, terminal: bool| EvaluationStep {
        rule: rule.id().to_string(),
        check: check.to_string(),
        outcome,
        terminal,
    };

    let conditions = match rule.conditions() {
        Some(conditions) if !conditions.is_empty() => conditions,
        _ => {
            record(step("conditions", "applies: no conditions".to_string(), true));
            tracing::debug!(rule = rule.id(), "rule applies unconditionally");
            return true;
        }
    };

    for item in conditions {
        let (check, result) = check_condition(item, request);
        match result {
            Ok(outcome) => record(step(&check, outcome, false)),
            Err(outcome) => {
                record(step(&check, format!("failed: {}", outcome), true));
                tracing::debug!(rule = rule.id(), check = %check, "rule does not apply");
                return false;
            }
        }
    }
    record(step("conditions", "applies: all conditions satisfied".to_string(), true));
    tracing::debug!(rule = rule.id(), "rule applies");
    true
}

/// Check one condition. Ok carries the outcome of a satisfied check, Err the
/// reason it failed.
fn check_condition(item: &ConditionItem, request: &PolicyRequest) -> (String, Result<String, String>) {
    match item {
        ConditionItem::Identity(identity) => {
            let result = if identity.matches(&request.identity) {
                Ok(format!("matched '{}'", request.identity))
            } else {
                Err(format!("'{}' matches no alternative", request.identity))
            };
            ("identity".to_string(), result)
        }
        ConditionItem::Sphere(sphere) => {
            let result = match (request.sphere.as_deref(), sphere.value()) {
                (Some(current), Some(wanted)) if current == wanted => {
                    Ok(format!("current sphere is '{}'", current))
                }
                (Some(current), wanted) => Err(format!(
                    "current sphere '{}' is not '{}'",
                    current,
                    wanted.unwrap_or_default()
                )),
                (None, _) => Err("no current sphere".to_string()),
            };
            ("sphere".to_string(), result)
        }
        ConditionItem::Validity(validity) => {
            let result = if validity.contains(request.at) {
                Ok(format!("{} is inside a validity interval", request.at.to_rfc3339()))
            } else {
                Err(format!(
                    "{} is outside all {} validity intervals",
                    request.at.to_rfc3339(),
                    validity.len()
                ))
            };
            ("validity".to_string(), result)
        }
        ConditionItem::Extension(extension) => {
            let kind = item.kind();
            let result = if extension.as_any().is::<FalseCondition>() {
                Err("false-condition is never satisfied".to_string())
            } else {
                Err(format!("unsupported condition {}", kind))
            };
            (kind.local_name().to_string(), result)
        }
    }
}
