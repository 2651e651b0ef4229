use super::facts::FactBundle;
use super::script::ScriptBundle;
use super::sla::SlaBundle;

/// Number of items on the AI script checklist.
pub(crate) const SCRIPT_CHECKLIST_LEN: u32 = 14;

/// Aggregate result of one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSummary {
    pub deal_score: Option<u32>,
    pub deal_score_pct: Option<u32>,
    pub script_score: Option<u32>,
    pub script_score_pct: Option<u32>,
    pub total_score: Option<u32>,
}

/// Combines deterministic facts, SLA flags, and the AI verdict into the
/// persisted sub-scores. Pure so the arithmetic stays testable without a
/// store.
pub fn calc_scores(facts: &FactBundle, sla: &SlaBundle, script: &ScriptBundle) -> ScoreSummary {
    // The 13 deterministic deal-score fields. The after-TZ alias is left
    // out so the same fact is not counted twice.
    let deal_fields = [
        facts.technical_spec_received,
        facts.buyer_filled,
        facts.product_category_filled,
        facts.contact_data_present,
        facts.relevant_number_found,
        facts.expected_amount_present,
        facts.purchase_form_present,
        facts.industry_present,
        facts.has_comment_event,
        facts.email_sent_after_missed_call,
        sla.lead_in_work_lt_1_day,
        sla.next_contact_not_overdue,
        sla.deal_in_status_lt_5_days,
    ];

    let evaluable = deal_fields.iter().filter(|field| field.is_some()).count() as u32;
    let passed = deal_fields.iter().filter(|field| **field == Some(true)).count() as u32;

    let (deal_score, deal_score_pct) = if evaluable == 0 {
        (None, None)
    } else {
        let pct = (f64::from(passed) / f64::from(evaluable) * 100.0).round() as u32;
        (Some(passed), Some(pct))
    };

    let script_score_pct = script.script_score_pct;
    let script_score = script_score_pct
        .map(|pct| (f64::from(pct) / 100.0 * f64::from(SCRIPT_CHECKLIST_LEN)).round() as u32);

    let total_score = match (deal_score_pct, script_score_pct) {
        (Some(deal), Some(script)) => {
            Some(((f64::from(deal) + f64::from(script)) / 2.0).round() as u32)
        }
        (Some(deal), None) => Some(deal),
        (None, Some(script)) => Some(script),
        (None, None) => None,
    };

    ScoreSummary {
        deal_score,
        deal_score_pct,
        script_score,
        script_score_pct,
        total_score,
    }
}
