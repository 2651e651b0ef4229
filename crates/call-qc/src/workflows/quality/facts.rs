use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use super::domain::{CallDirection, CallRecord, ManagerId, OrderId};
use super::repository::{QualityRepository, RepositoryError};

/// Any call longer than this counts as a connected conversation.
pub(crate) const CONNECTED_THRESHOLD_SECS: i64 = 15;

pub(crate) const CALL_STATUS_CONNECTED: &str = "Дозвон есть";
pub(crate) const CALL_STATUS_ATTEMPTED: &str = "Попытки без ответа";
pub(crate) const CALL_STATUS_NONE: &str = "Нет звонков";

/// Deterministic, non-AI signals gathered for one order. Every field except
/// the id degrades to `None`/empty when the underlying data is absent.
#[derive(Debug, Clone, Default)]
pub struct FactBundle {
    pub order_id: OrderId,
    pub manager_id: Option<ManagerId>,
    pub order_status: Option<String>,
    pub lead_received_at: Option<DateTime<Utc>>,

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

    pub call_status: Option<String>,
    pub total_call_duration: Option<String>,
    pub outgoing_call_count: Option<u32>,
    pub transcribed_call_count: Option<u32>,
    pub first_contact_latency: Option<String>,

    /// All transcribed calls rendered chronologically; the exact text later
    /// fed to the script evaluator.
    pub transcript_history: String,
}

/// Read-only collection pass over one order's persisted rows. A missing
/// order is normal CRM noise, not an error: order-derived fields stay
/// `None` and only store failures propagate.
pub fn collect_facts(
    repo: &dyn QualityRepository,
    order_id: OrderId,
) -> Result<FactBundle, RepositoryError> {
    let order = repo.order(order_id)?;
    let mut calls = repo.calls_for_order(order_id)?;
    calls.sort_by_key(|call| call.started_at);

    let mut facts = FactBundle {
        order_id,
        ..FactBundle::default()
    };

    let outgoing: Vec<&CallRecord> = calls
        .iter()
        .filter(|call| call.direction == CallDirection::Outgoing)
        .collect();

    facts.call_status = Some(call_status_label(&calls).to_string());
    facts.total_call_duration = Some(format_call_duration(
        calls.iter().map(|call| call.duration_secs.max(0)).sum(),
    ));
    facts.outgoing_call_count = Some(outgoing.len() as u32);
    facts.transcribed_call_count =
        Some(calls.iter().filter(|call| call.transcript.is_some()).count() as u32);
    facts.transcript_history = render_transcript_history(&calls);

    let Some(order) = order else {
        return Ok(facts);
    };

    let history = repo.history_for_order(order_id)?;

    facts.manager_id = order.manager_id;
    facts.order_status = Some(order.status.clone());
    facts.lead_received_at = Some(order.created_at);

    facts.technical_spec_received = Some(order.custom_present("technical_spec"));
    facts.buyer_filled = Some(order.custom_present("buyer_company"));
    facts.product_category_filled = Some(order.custom_present("product_category"));
    facts.contact_data_present = Some(order.custom_present("contact_phone"));
    facts.relevant_number_found = Some(!outgoing.is_empty());
    facts.expected_amount_present = Some(order.custom_present("expected_amount"));
    facts.purchase_form_present = Some(order.custom_present("purchase_form"));
    facts.industry_present = Some(order.custom_present("industry"));
    facts.has_comment_event = Some(history.iter().any(|event| event.field == "comment"));

    // An outbound email is only required when at least one outgoing call
    // failed to connect; with no missed calls the flag holds vacuously.
    let any_missed_outgoing = outgoing.iter().any(|call| call.duration_secs == 0);
    facts.email_sent_after_missed_call = Some(if any_missed_outgoing {
        history.iter().any(|event| event.field == "email")
    } else {
        true
    });

    if let Some(first_outgoing) = outgoing.first() {
        facts.first_contact_latency = Some(format_first_contact_latency(
            order.created_at,
            first_outgoing.started_at,
        ));
    }

    Ok(facts)
}

pub(crate) fn call_status_label(calls: &[CallRecord]) -> &'static str {
    if calls
        .iter()
        .any(|call| call.duration_secs > CONNECTED_THRESHOLD_SECS)
    {
        CALL_STATUS_CONNECTED
    } else if calls.is_empty() {
        CALL_STATUS_NONE
    } else {
        CALL_STATUS_ATTEMPTED
    }
}

/// Total talk time as `<минуты>м <секунды>с`.
pub(crate) fn format_call_duration(total_secs: i64) -> String {
    format!("{}м {}с", total_secs / 60, total_secs % 60)
}

/// Lead-to-first-call latency as `<часы>ч <минуты>м`, or the literal
/// `< 0` marker when the call predates order creation (a data anomaly the
/// reviewers want to see, not an error).
pub(crate) fn format_first_contact_latency(
    lead_received_at: DateTime<Utc>,
    first_call_at: DateTime<Utc>,
) -> String {
    let delta = first_call_at - lead_received_at;
    if delta < chrono::Duration::zero() {
        return "< 0".to_string();
    }
    format!("{}ч {}м", delta.num_hours(), delta.num_minutes() % 60)
}

fn render_transcript_history(calls: &[CallRecord]) -> String {
    let mut history = String::new();
    for call in calls {
        let Some(transcript) = call.transcript.as_deref() else {
            continue;
        };
        if !history.is_empty() {
            history.push_str("\n\n");
        }
        let _ = write!(
            history,
            "{}, {}, {}с:\n{}",
            call.direction.label(),
            call.started_at.format("%d.%m.%Y %H:%M"),
            call.duration_secs,
            transcript
        );
    }
    history
}
