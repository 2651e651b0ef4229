use chrono::{DateTime, Duration, Utc};

use super::domain::Order;

/// Wall-clock seam so SLA checks stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock reading the real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Temporal service-level flags for one order. `None` means the input
/// needed for the check was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaBundle {
    pub lead_in_work_lt_1_day: Option<bool>,
    pub next_contact_not_overdue: Option<bool>,
    /// Alias of `lead_in_work_lt_1_day`: the ingested data carries no
    /// distinct "technical spec received" timestamp to measure from.
    pub lead_in_work_lt_1_day_after_tz: Option<bool>,
    pub deal_in_status_lt_5_days: Option<bool>,
}

/// Pure given its inputs; the current time comes from the injected clock.
pub fn check_sla(
    order: Option<&Order>,
    lead_received_at: Option<DateTime<Utc>>,
    clock: &dyn Clock,
) -> SlaBundle {
    let now = clock.now();

    let lead_in_work_lt_1_day =
        lead_received_at.map(|received| now - received <= Duration::hours(24));

    let next_contact_not_overdue = order.map(|order| {
        match order
            .custom_text("next_contact_date")
            .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
        {
            // No planned contact means nothing can be overdue.
            None => true,
            Some(planned) => planned >= now,
        }
    });

    let deal_in_status_lt_5_days = order.map(|order| now - order.updated_at < Duration::days(5));

    SlaBundle {
        lead_in_work_lt_1_day,
        next_contact_not_overdue,
        lead_in_work_lt_1_day_after_tz: lead_in_work_lt_1_day,
        deal_in_status_lt_5_days,
    }
}
