//! Configurable rule layer on top of the built-in violation set.
//!
//! Operator-defined rules arrive as `{block, params}` objects from the
//! settings UI; here they are a closed tagged union with one dispatch
//! site, so an unknown block name fails deserialization instead of
//! surfacing at evaluation time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CallRecord, ManagerId, Order, OrderHistoryEvent, OrderId, Severity};

/// What makes a rule fire at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum RuleTrigger {
    /// A `status` history event, optionally pinned to specific codes.
    StatusChange {
        from: Option<String>,
        to: Option<String>,
    },
    /// A finished call, optionally requiring a minimum duration.
    CallFinished { min_duration_secs: Option<i64> },
}

/// Reference point for elapsed-time conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAnchor {
    OrderCreated,
    OrderUpdated,
}

/// Extra predicates that must all hold for a triggered rule to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum RuleCondition {
    TimeElapsed {
        since: TimeAnchor,
        more_than_secs: i64,
    },
    FieldEmpty {
        field: String,
    },
    /// Holds when the transcript never mentions the phrase.
    SemanticCheck {
        must_mention: String,
    },
}

/// A named, operator-configured predicate with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub severity: Severity,
    pub points: i32,
    pub active: bool,
    pub trigger: RuleTrigger,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

/// Everything a rule may inspect about the event being judged.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub order: &'a Order,
    pub event: Option<&'a OrderHistoryEvent>,
    pub call: Option<&'a CallRecord>,
    pub transcript: &'a str,
    pub now: DateTime<Utc>,
}

/// Finding produced by a configured rule; kept separate from the built-in
/// [`super::domain::Violation`] codes so the closed enum stays closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFinding {
    pub rule: String,
    pub severity: Severity,
    pub points: i32,
    pub manager_id: ManagerId,
    pub order_id: OrderId,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Single dispatch point: trigger match, then all conditions. Inactive
/// rules and unattributable events never emit.
pub fn evaluate(rule: &RuleDefinition, ctx: &RuleContext<'_>) -> Option<RuleFinding> {
    if !rule.active {
        return None;
    }

    let occurred_at = match &rule.trigger {
        RuleTrigger::StatusChange { from, to } => {
            let event = ctx.event.filter(|event| event.field == "status")?;
            let old = event.old_value.as_deref().unwrap_or("");
            let new = event.new_value.as_deref().unwrap_or("");
            if from.as_deref().is_some_and(|expected| expected != old) {
                return None;
            }
            if to.as_deref().is_some_and(|expected| expected != new) {
                return None;
            }
            event.occurred_at
        }
        RuleTrigger::CallFinished { min_duration_secs } => {
            let call = ctx.call?;
            if min_duration_secs.is_some_and(|min| call.duration_secs < min) {
                return None;
            }
            call.started_at
        }
    };

    for condition in &rule.conditions {
        let holds = match condition {
            RuleCondition::TimeElapsed {
                since,
                more_than_secs,
            } => {
                let anchor = match since {
                    TimeAnchor::OrderCreated => ctx.order.created_at,
                    TimeAnchor::OrderUpdated => ctx.order.updated_at,
                };
                ctx.now - anchor > Duration::seconds(*more_than_secs)
            }
            RuleCondition::FieldEmpty { field } => !ctx.order.custom_present(field),
            RuleCondition::SemanticCheck { must_mention } => !ctx
                .transcript
                .to_lowercase()
                .contains(&must_mention.to_lowercase()),
        };
        if !holds {
            return None;
        }
    }

    let manager_id = ctx
        .event
        .and_then(|event| event.manager_id)
        .or(ctx.order.manager_id)?;

    Some(RuleFinding {
        rule: rule.name.clone(),
        severity: rule.severity,
        points: rule.points,
        manager_id,
        order_id: ctx.order.id,
        detail: format!("rule '{}' matched", rule.name),
        occurred_at,
    })
}
