use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a CRM order (deal). Orders at or above
/// [`SYNTHETIC_ORDER_FLOOR`] are reserved for self-test fixtures.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OrderId(pub i64);

/// Identifier of a sales manager in the CRM directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManagerId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ids at or above this value belong to the self-test endpoint and must
/// never be scored as real orders.
pub const SYNTHETIC_ORDER_FLOOR: i64 = 99_900_000;

/// A sales deal mirrored from the CRM. Custom attributes arrive as an
/// open-ended bag; the fact collector reads the keys it knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: String,
    pub manager_id: Option<ManagerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Order {
    /// Text value of a custom attribute, with empty strings treated as absent.
    pub fn custom_text(&self, key: &str) -> Option<&str> {
        self.custom
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Whether a custom attribute carries any usable value.
    pub fn custom_present(&self, key: &str) -> bool {
        match self.custom.get(key) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// Direction of a telephony event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

impl CallDirection {
    /// Russian label used when rendering transcript history.
    pub fn label(self) -> &'static str {
        match self {
            CallDirection::Incoming => "Входящий",
            CallDirection::Outgoing => "Исходящий",
        }
    }
}

/// A single call ingested from telephony. Immutable apart from transcript
/// backfill performed by the sync jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub direction: CallDirection,
    pub started_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    #[serde(default)]
    pub answering_machine: bool,
}

/// One field change on an order, appended by the CRM sync. A `None`
/// manager means the change was system-generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHistoryEvent {
    pub order_id: OrderId,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub manager_id: Option<ManagerId>,
    pub occurred_at: DateTime<Utc>,
}

/// Ranking of a compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Closed set of built-in rule codes emitted by the violation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    CallImpersonation,
    ShortCall,
    MissedCall,
    NoCommentOnStatusChange,
    FakeQualification,
    NoCallBeforeQualification,
    IllegalCancelFromNew,
    OrderExitWithoutResult,
    TimerResetAttempt,
    OrderDragging,
    CriticalStatusOverdue,
}

impl ViolationKind {
    /// Each rule carries one fixed severity.
    pub fn severity(self) -> Severity {
        match self {
            ViolationKind::CallImpersonation
            | ViolationKind::MissedCall
            | ViolationKind::FakeQualification
            | ViolationKind::NoCallBeforeQualification => Severity::High,
            ViolationKind::ShortCall
            | ViolationKind::IllegalCancelFromNew
            | ViolationKind::OrderExitWithoutResult
            | ViolationKind::TimerResetAttempt
            | ViolationKind::CriticalStatusOverdue => Severity::Medium,
            ViolationKind::NoCommentOnStatusChange | ViolationKind::OrderDragging => Severity::Low,
        }
    }
}

/// A compliance finding surfaced to reviewers. The manager id is always
/// resolved: findings that cannot be attributed to a person are dropped
/// before they leave the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "violation_type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub manager_id: ManagerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    pub order_id: Option<OrderId>,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        manager_id: ManagerId,
        order_id: Option<OrderId>,
        detail: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            manager_id,
            manager_name: None,
            order_id,
            detail: detail.into(),
            occurred_at,
        }
    }
}

/// Externally configured status code sets. The engine compares codes by
/// membership only and never interprets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusBook {
    pub new_statuses: BTreeSet<String>,
    pub qualified_status: String,
    pub cancel_statuses: BTreeSet<String>,
    pub working_statuses: BTreeSet<String>,
}

impl StatusBook {
    pub fn is_new(&self, status: &str) -> bool {
        self.new_statuses.contains(status)
    }

    pub fn is_qualified(&self, status: &str) -> bool {
        self.qualified_status == status
    }

    pub fn is_cancel(&self, status: &str) -> bool {
        self.cancel_statuses.contains(status)
    }
}

/// Scoring snapshot for one order. One row per order, destructively
/// overwritten on each re-evaluation; `None` in a boolean field means
/// "not evaluated", which is distinct from a failed check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderScore {
    pub order_id: OrderId,
    pub manager_id: Option<ManagerId>,
    pub order_status: Option<String>,
    pub lead_received_at: Option<DateTime<Utc>>,

    // Deterministic field-completeness facts.
    pub technical_spec_received: Option<bool>,
    pub buyer_filled: Option<bool>,
    pub product_category_filled: Option<bool>,
    pub contact_data_present: Option<bool>,
    pub relevant_number_found: Option<bool>,
    pub expected_amount_present: Option<bool>,
    pub purchase_form_present: Option<bool>,
    pub industry_present: Option<bool>,
    pub has_comment_event: Option<bool>,
    pub email_sent_after_missed_call: Option<bool>,

    // Call aggregates.
    pub call_status: Option<String>,
    pub total_call_duration: Option<String>,
    pub outgoing_call_count: Option<u32>,
    pub transcribed_call_count: Option<u32>,
    pub first_contact_latency: Option<String>,

    // SLA flags.
    pub lead_in_work_lt_1_day: Option<bool>,
    pub next_contact_not_overdue: Option<bool>,
    pub lead_in_work_lt_1_day_after_tz: Option<bool>,
    pub deal_in_status_lt_5_days: Option<bool>,

    // AI script checklist.
    pub greeting: Option<bool>,
    pub stated_call_purpose: Option<bool>,
    pub company_info_discovery: Option<bool>,
    pub deadline_discovery: Option<bool>,
    pub spec_confirmation: Option<bool>,
    pub objection_handling_price: Option<bool>,
    pub objection_handling_terms: Option<bool>,
    pub advantage_quality: Option<bool>,
    pub advantage_logistics: Option<bool>,
    pub advantage_service: Option<bool>,
    pub cross_sell: Option<bool>,
    pub next_step_agreement: Option<bool>,
    pub dialogue_control: Option<bool>,
    pub speech_quality: Option<bool>,
    pub evaluator_comment: Option<String>,

    // Aggregates.
    pub deal_score: Option<u32>,
    pub deal_score_pct: Option<u32>,
    pub script_score: Option<u32>,
    pub script_score_pct: Option<u32>,
    pub total_score: Option<u32>,
}
