//! Built-in compliance rules scanned over calls and order history.
//!
//! The engine is a pure read-and-compute pass: it shares only the store
//! and the status/manager configuration with the scoring pipeline and
//! persists nothing itself. Callers that store the returned findings must
//! pick their own deduplication key, since overlapping windows re-emit.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    CallDirection, ManagerId, OrderHistoryEvent, OrderId, StatusBook, Violation, ViolationKind,
};
use super::repository::{QualityRepository, RepositoryError};
use super::sla::Clock;

/// An answering machine past this duration was presented as a live call.
const AM_REAL_CALL_SECS: i64 = 15;
/// Below this a nonzero call cannot have been a real conversation.
const IMPERSONATION_MAX_SECS: i64 = 5;
const SHORT_CALL_MAX_SECS: i64 = 20;
/// An outgoing call must exceed this to justify qualification.
const QUALIFYING_CALL_SECS: i64 = 20;
const SIBLING_WINDOW_SECS: i64 = 10;
const TIMER_RESET_WINDOW_SECS: i64 = 60;
const DRAGGING_DAYS: i64 = 30;
const CRITICAL_NEW_HOURS: i64 = 4;

/// Scan `[start, end]` inclusive and return attributed findings, newest
/// first. Findings without a resolvable manager are dropped, and when the
/// controlled-manager set is non-empty only its members pass through.
pub fn detect_violations(
    repo: &dyn QualityRepository,
    clock: &dyn Clock,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Violation>, RepositoryError> {
    let managers = repo.manager_directory()?;
    let book = repo.status_book()?;
    let controlled = repo.controlled_managers()?;

    let mut found = Vec::new();
    scan_calls(repo, start, end, &mut found)?;
    scan_history(repo, &book, start, end, &mut found)?;
    scan_working_orders(repo, &book, clock, &mut found)?;

    let mut found: Vec<Violation> = found
        .into_iter()
        .filter(|violation| controlled.is_empty() || controlled.contains(&violation.manager_id))
        .map(|mut violation| {
            violation.manager_name = managers.get(&violation.manager_id).cloned();
            violation
        })
        .collect();
    found.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    Ok(found)
}

/// Call-band rules. Only calls matched to an order are examined; the
/// finding is attributed to the order's manager. The bands form an
/// exclusive chain, so one call yields at most one finding.
fn scan_calls(
    repo: &dyn QualityRepository,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    found: &mut Vec<Violation>,
) -> Result<(), RepositoryError> {
    for call in repo.calls_between(start, end)? {
        let Some(order_id) = repo.order_for_call(call.id)? else {
            continue;
        };
        let Some(order) = repo.order(order_id)? else {
            continue;
        };

        let secs = call.duration_secs;
        let (kind, detail) = if secs > AM_REAL_CALL_SECS && call.answering_machine {
            (
                ViolationKind::CallImpersonation,
                format!("answering machine logged as a {secs}s live conversation"),
            )
        } else if secs > 0 && secs < IMPERSONATION_MAX_SECS {
            (
                ViolationKind::CallImpersonation,
                format!("{secs}s call is too short to be a real conversation"),
            )
        } else if (IMPERSONATION_MAX_SECS..SHORT_CALL_MAX_SECS).contains(&secs) {
            (ViolationKind::ShortCall, format!("call lasted only {secs}s"))
        } else if call.direction == CallDirection::Incoming && secs == 0 {
            (
                ViolationKind::MissedCall,
                "incoming call went unanswered".to_string(),
            )
        } else {
            continue;
        };

        record(
            found,
            kind,
            order.manager_id,
            Some(order_id),
            detail,
            call.started_at,
        );
    }
    Ok(())
}

/// Status-transition rules over each order's history, in ascending
/// timestamp order. The sort happens here once; the store's natural
/// return order is never trusted for the previous-event rules.
fn scan_history(
    repo: &dyn QualityRepository,
    book: &StatusBook,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    found: &mut Vec<Violation>,
) -> Result<(), RepositoryError> {
    let mut by_order: BTreeMap<OrderId, Vec<OrderHistoryEvent>> = BTreeMap::new();
    for event in repo.history_between(start, end)? {
        by_order.entry(event.order_id).or_default().push(event);
    }

    for (order_id, mut events) in by_order {
        events.sort_by_key(|event| event.occurred_at);
        let calls = repo.calls_for_order(order_id)?;

        let mut prev_status: Option<&OrderHistoryEvent> = None;
        for event in &events {
            if event.field != "status" {
                continue;
            }
            let old = event.old_value.as_deref().unwrap_or("");
            let new = event.new_value.as_deref().unwrap_or("");

            if !has_sibling(&events, event, |field| field == "comment") {
                record(
                    found,
                    ViolationKind::NoCommentOnStatusChange,
                    event.manager_id,
                    Some(order_id),
                    format!("status changed to '{new}' without a comment"),
                    event.occurred_at,
                );
            }

            if book.is_qualified(new) {
                if book.is_new(old) {
                    let real_call_before = calls.iter().any(|call| {
                        call.direction == CallDirection::Outgoing
                            && call.duration_secs > QUALIFYING_CALL_SECS
                            && !call.answering_machine
                            && call.started_at <= event.occurred_at
                    });
                    if !real_call_before {
                        record(
                            found,
                            ViolationKind::FakeQualification,
                            event.manager_id,
                            Some(order_id),
                            "order qualified without a prior real conversation".to_string(),
                            event.occurred_at,
                        );
                    }
                }
                if calls.is_empty() {
                    record(
                        found,
                        ViolationKind::NoCallBeforeQualification,
                        event.manager_id,
                        Some(order_id),
                        "order qualified with no calls matched at all".to_string(),
                        event.occurred_at,
                    );
                }
            }

            if book.is_new(old) && book.is_cancel(new) {
                record(
                    found,
                    ViolationKind::IllegalCancelFromNew,
                    event.manager_id,
                    Some(order_id),
                    format!("cancelled straight from '{old}'"),
                    event.occurred_at,
                );
            }

            if book.is_cancel(new) {
                let has_reason = has_sibling(&events, event, |field| {
                    let field = field.to_ascii_lowercase();
                    field.contains("reason") || field.contains("cancel")
                });
                if !has_reason {
                    record(
                        found,
                        ViolationKind::OrderExitWithoutResult,
                        event.manager_id,
                        Some(order_id),
                        format!("order left to '{new}' without a recorded reason"),
                        event.occurred_at,
                    );
                }
            }

            if let Some(prev) = prev_status {
                let bounced = event.new_value.is_some() && event.new_value == prev.old_value;
                let within = (event.occurred_at - prev.occurred_at)
                    <= Duration::seconds(TIMER_RESET_WINDOW_SECS);
                if bounced && within {
                    record(
                        found,
                        ViolationKind::TimerResetAttempt,
                        event.manager_id,
                        Some(order_id),
                        format!("status bounced back to '{new}' within a minute"),
                        event.occurred_at,
                    );
                }
            }
            prev_status = Some(event);
        }
    }
    Ok(())
}

/// Dwell-time rules over everything currently in a working status; these
/// look at the order clock, not at the scan window.
fn scan_working_orders(
    repo: &dyn QualityRepository,
    book: &StatusBook,
    clock: &dyn Clock,
    found: &mut Vec<Violation>,
) -> Result<(), RepositoryError> {
    let now = clock.now();
    for order in repo.orders_in_statuses(&book.working_statuses, usize::MAX)? {
        if now - order.updated_at > Duration::days(DRAGGING_DAYS) {
            record(
                found,
                ViolationKind::OrderDragging,
                order.manager_id,
                Some(order.id),
                format!(
                    "order untouched for {} days",
                    (now - order.updated_at).num_days()
                ),
                order.updated_at,
            );
        }

        if book.is_new(&order.status) && now - order.created_at > Duration::hours(CRITICAL_NEW_HOURS)
        {
            record(
                found,
                ViolationKind::CriticalStatusOverdue,
                order.manager_id,
                Some(order.id),
                format!(
                    "still in '{}' after {} hours",
                    order.status,
                    (now - order.created_at).num_hours()
                ),
                order.created_at,
            );
        }
    }
    Ok(())
}

/// Another event on the same order within ±10s of the anchor. Used for the
/// comment and cancel-reason checks.
fn has_sibling(
    events: &[OrderHistoryEvent],
    anchor: &OrderHistoryEvent,
    mut matches: impl FnMut(&str) -> bool,
) -> bool {
    events.iter().any(|event| {
        matches(&event.field)
            && (event.occurred_at - anchor.occurred_at)
                .num_seconds()
                .abs()
                <= SIBLING_WINDOW_SECS
    })
}

/// Rows without an acting manager are system-generated and are not held
/// against staff.
fn record(
    found: &mut Vec<Violation>,
    kind: ViolationKind,
    manager_id: Option<ManagerId>,
    order_id: Option<OrderId>,
    detail: String,
    occurred_at: DateTime<Utc>,
) {
    if let Some(manager_id) = manager_id {
        found.push(Violation::new(kind, manager_id, order_id, detail, occurred_at));
    }
}
