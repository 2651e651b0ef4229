use crate::workflows::quality::facts::FactBundle;
use crate::workflows::quality::scoring::calc_scores;
use crate::workflows::quality::script::ScriptBundle;
use crate::workflows::quality::sla::SlaBundle;

fn full_facts() -> FactBundle {
    FactBundle {
        technical_spec_received: Some(true),
        buyer_filled: Some(true),
        product_category_filled: Some(false),
        contact_data_present: Some(true),
        relevant_number_found: Some(true),
        expected_amount_present: Some(false),
        purchase_form_present: Some(true),
        industry_present: Some(true),
        has_comment_event: Some(true),
        email_sent_after_missed_call: Some(true),
        ..FactBundle::default()
    }
}

fn full_sla() -> SlaBundle {
    SlaBundle {
        lead_in_work_lt_1_day: Some(true),
        next_contact_not_overdue: Some(true),
        lead_in_work_lt_1_day_after_tz: Some(true),
        deal_in_status_lt_5_days: Some(false),
    }
}

#[test]
fn deal_score_counts_true_fields_over_evaluable_ones() {
    let summary = calc_scores(&full_facts(), &full_sla(), &ScriptBundle::empty());

    // 10 of 13 evaluable fields are true.
    assert_eq!(summary.deal_score, Some(10));
    assert_eq!(summary.deal_score_pct, Some(77));
    assert_eq!(summary.script_score, None);
    assert_eq!(summary.total_score, Some(77));
}

#[test]
fn null_fields_shrink_the_denominator() {
    let mut facts = full_facts();
    facts.technical_spec_received = None;
    facts.expected_amount_present = None;
    let summary = calc_scores(&facts, &full_sla(), &ScriptBundle::empty());

    // 9 of 11 evaluable fields are true.
    assert_eq!(summary.deal_score, Some(9));
    assert_eq!(summary.deal_score_pct, Some(82));
}

#[test]
fn all_null_fields_yield_null_deal_score() {
    let summary = calc_scores(
        &FactBundle::default(),
        &SlaBundle::default(),
        &ScriptBundle::empty(),
    );

    assert_eq!(summary.deal_score, None);
    assert_eq!(summary.deal_score_pct, None);
    assert_eq!(summary.total_score, None);
}

#[test]
fn deal_score_pct_stays_within_bounds() {
    for (flag, expected) in [(Some(true), 100), (Some(false), 0)] {
        let facts = FactBundle {
            technical_spec_received: flag,
            ..FactBundle::default()
        };
        let summary = calc_scores(&facts, &SlaBundle::default(), &ScriptBundle::empty());
        assert_eq!(summary.deal_score_pct, Some(expected));
    }
}

#[test]
fn script_score_scales_percentage_to_checklist_points() {
    let script = ScriptBundle {
        script_score_pct: Some(50),
        ..ScriptBundle::empty()
    };
    let summary = calc_scores(&FactBundle::default(), &SlaBundle::default(), &script);

    assert_eq!(summary.script_score, Some(7));
    assert_eq!(summary.script_score_pct, Some(50));
    // Only the script side is present, so it becomes the total.
    assert_eq!(summary.total_score, Some(50));
}

#[test]
fn total_score_averages_both_percentages() {
    let script = ScriptBundle {
        script_score_pct: Some(60),
        ..ScriptBundle::empty()
    };
    let summary = calc_scores(&full_facts(), &full_sla(), &script);

    assert_eq!(summary.deal_score_pct, Some(77));
    assert_eq!(summary.total_score, Some(69));
}

#[test]
fn after_tz_alias_never_double_counts() {
    let sla = SlaBundle {
        lead_in_work_lt_1_day: Some(true),
        lead_in_work_lt_1_day_after_tz: Some(true),
        ..SlaBundle::default()
    };
    let summary = calc_scores(&FactBundle::default(), &sla, &ScriptBundle::empty());

    assert_eq!(summary.deal_score, Some(1));
    assert_eq!(summary.deal_score_pct, Some(100));
}
