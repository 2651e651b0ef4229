use super::common::*;
use crate::workflows::quality::facts::{
    collect_facts, format_call_duration, format_first_contact_latency, CALL_STATUS_ATTEMPTED,
    CALL_STATUS_CONNECTED, CALL_STATUS_NONE,
};
use crate::workflows::quality::{OrderId, QualityRepository};

fn seeded_order_repo() -> std::sync::Arc<MemoryRepository> {
    let mut state = MemoryState::default();
    let mut order = order(700, WORKING_STATUS, Some(5), "2025-06-01T09:00:00Z");
    order
        .custom
        .insert("expected_amount".to_string(), serde_json::json!("150000"));
    order
        .custom
        .insert("industry".to_string(), serde_json::json!("metallurgy"));
    order
        .custom
        .insert("purchase_form".to_string(), serde_json::json!(""));
    state.orders.insert(OrderId(700), order);
    state.book = status_book();
    MemoryRepository::with_state(state)
}

#[test]
fn missing_order_degrades_to_nulls_without_error() {
    let repo = MemoryRepository::with_state(MemoryState::default());

    let facts = collect_facts(repo.as_ref(), OrderId(1)).expect("no error for missing order");

    assert_eq!(facts.order_id, OrderId(1));
    assert!(facts.manager_id.is_none());
    assert!(facts.order_status.is_none());
    assert!(facts.technical_spec_received.is_none());
    assert!(facts.email_sent_after_missed_call.is_none());
    assert_eq!(facts.call_status.as_deref(), Some(CALL_STATUS_NONE));
    assert!(facts.transcript_history.is_empty());
}

#[test]
fn custom_field_completeness_distinguishes_empty_strings() {
    let repo = seeded_order_repo();

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    assert_eq!(facts.expected_amount_present, Some(true));
    assert_eq!(facts.industry_present, Some(true));
    // Present key with a blank value does not count as filled.
    assert_eq!(facts.purchase_form_present, Some(false));
    assert_eq!(facts.technical_spec_received, Some(false));
}

#[test]
fn call_status_label_tracks_connection_bands() {
    let repo = seeded_order_repo();
    repo.add_matched_call(outgoing_call(1, "2025-06-01T10:00:00Z", 8), 700);
    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");
    assert_eq!(facts.call_status.as_deref(), Some(CALL_STATUS_ATTEMPTED));

    repo.add_matched_call(outgoing_call(2, "2025-06-01T11:00:00Z", 90), 700);
    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");
    assert_eq!(facts.call_status.as_deref(), Some(CALL_STATUS_CONNECTED));
    assert_eq!(facts.outgoing_call_count, Some(2));
    assert_eq!(facts.total_call_duration.as_deref(), Some("1м 38с"));
    assert_eq!(facts.relevant_number_found, Some(true));
}

#[test]
fn first_contact_latency_formats_hours_and_minutes() {
    let repo = seeded_order_repo();
    repo.add_matched_call(outgoing_call(1, "2025-06-01T12:05:00Z", 60), 700);

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    assert_eq!(facts.first_contact_latency.as_deref(), Some("3ч 5м"));
}

#[test]
fn first_contact_before_order_creation_is_flagged_not_rejected() {
    let repo = seeded_order_repo();
    repo.add_matched_call(outgoing_call(1, "2025-06-01T08:00:00Z", 60), 700);

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    assert_eq!(facts.first_contact_latency.as_deref(), Some("< 0"));
}

#[test]
fn email_flag_defaults_true_without_missed_outgoing_calls() {
    let repo = seeded_order_repo();
    repo.add_matched_call(outgoing_call(1, "2025-06-01T10:00:00Z", 45), 700);

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    assert_eq!(facts.email_sent_after_missed_call, Some(true));
}

#[test]
fn email_flag_requires_email_event_after_missed_outgoing_call() {
    let repo = seeded_order_repo();
    repo.add_matched_call(outgoing_call(1, "2025-06-01T10:00:00Z", 0), 700);

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");
    assert_eq!(facts.email_sent_after_missed_call, Some(false));

    repo.state
        .lock()
        .expect("repository mutex poisoned")
        .history
        .push(field_event(700, "email", Some(5), "2025-06-01T10:30:00Z"));
    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");
    assert_eq!(facts.email_sent_after_missed_call, Some(true));
}

#[test]
fn transcript_history_is_chronological_with_prefixes() {
    let repo = seeded_order_repo();
    let mut late = outgoing_call(2, "2025-06-02T15:00:00Z", 120);
    late.transcript = Some("Второй разговор".to_string());
    let mut early = incoming_call(1, "2025-06-01T10:00:00Z", 30);
    early.transcript = Some("Первый разговор".to_string());
    repo.add_matched_call(late, 700);
    repo.add_matched_call(early, 700);
    repo.add_matched_call(outgoing_call(3, "2025-06-01T12:00:00Z", 10), 700);

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    let expected = "Входящий, 01.06.2025 10:00, 30с:\nПервый разговор\n\n\
                    Исходящий, 02.06.2025 15:00, 120с:\nВторой разговор";
    assert_eq!(facts.transcript_history, expected);
    assert_eq!(facts.transcribed_call_count, Some(2));
}

#[test]
fn duration_and_latency_formatting() {
    assert_eq!(format_call_duration(0), "0м 0с");
    assert_eq!(format_call_duration(125), "2м 5с");
    assert_eq!(
        format_first_contact_latency(ts("2025-06-01T09:00:00Z"), ts("2025-06-02T10:30:00Z")),
        "25ч 30м"
    );
}

#[test]
fn comment_events_feed_the_comment_fact() {
    let repo = seeded_order_repo();
    repo.state
        .lock()
        .expect("repository mutex poisoned")
        .history
        .push(field_event(700, "comment", Some(5), "2025-06-01T10:00:00Z"));

    let facts = collect_facts(repo.as_ref(), OrderId(700)).expect("facts");

    assert_eq!(facts.has_comment_event, Some(true));
    assert_eq!(
        repo.history_for_order(OrderId(700)).expect("history").len(),
        1
    );
}
