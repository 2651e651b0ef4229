use crate::infra::InMemoryQualityRepository;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clap::Args;
use std::sync::Arc;

use call_qc::error::AppError;
use call_qc::workflows::quality::{
    BatchRequest, EvaluationError, OrderId, QualityRepository, QualityService, ScriptEvaluator,
    ScriptModel, ScriptModelError,
};

#[derive(Args, Debug, Default)]
pub(crate) struct EvaluateArgs {
    /// Evaluate a single order instead of the full working set.
    #[arg(long)]
    pub(crate) order: Option<i64>,
    /// Cap on the number of orders pulled for a full run.
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ViolationsArgs {
    /// Start of the scan window (YYYY-MM-DD). Defaults to 30 days back.
    #[arg(long, value_parser = parse_day)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// End of the scan window (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_day)]
    pub(crate) end: Option<DateTime<Utc>>,
}

fn parse_day(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists")))
}

/// Offline stand-in for the language model, so the demo runs without an
/// endpoint or API key and still shows a populated script column.
struct CannedScriptModel;

#[async_trait]
impl ScriptModel for CannedScriptModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ScriptModelError> {
        Ok(r#"{
            "greeting": true,
            "stated_call_purpose": true,
            "company_info_discovery": true,
            "deadline_discovery": true,
            "spec_confirmation": false,
            "next_step_agreement": false,
            "dialogue_control": true,
            "speech_quality": true,
            "script_score_pct": 57,
            "evaluator_comment": "Хорошее открытие, но следующий шаг не зафиксирован"
        }"#
        .to_string())
    }
}

fn demo_service() -> QualityService<InMemoryQualityRepository> {
    QualityService::new(
        Arc::new(InMemoryQualityRepository::seeded()),
        ScriptEvaluator::new(Box::new(CannedScriptModel)),
    )
}

pub(crate) async fn run_evaluation_demo(args: EvaluateArgs) -> Result<(), AppError> {
    let service = demo_service();

    println!("Quality evaluation demo (seeded in-memory dataset)");
    let request = BatchRequest {
        limit: args.limit,
        order_id: args.order.map(OrderId),
    };
    let outcome = service.run_full_evaluation(request).await?;
    println!(
        "- Batch finished: {} processed, {} errors",
        outcome.processed, outcome.errors
    );

    for order_id in [OrderId(101), OrderId(102), OrderId(103)] {
        let Some(score) = service
            .repository()
            .score(order_id)
            .map_err(EvaluationError::from)?
        else {
            continue;
        };
        println!(
            "- Order {}: status {} | calls {} ({})",
            score.order_id,
            score.order_status.as_deref().unwrap_or("-"),
            score.outgoing_call_count.unwrap_or(0),
            score.call_status.as_deref().unwrap_or("-"),
        );
        println!(
            "    deal {} | script {} | total {}",
            fmt_pct(score.deal_score_pct),
            fmt_pct(score.script_score_pct),
            fmt_pct(score.total_score),
        );
        if let Some(comment) = &score.evaluator_comment {
            println!("    evaluator: {comment}");
        }
    }

    Ok(())
}

pub(crate) async fn run_violations_demo(args: ViolationsArgs) -> Result<(), AppError> {
    let service = demo_service();

    let end = args.end.unwrap_or_else(Utc::now);
    let start = args.start.unwrap_or(end - Duration::days(30));

    println!("Violation scan demo ({start} .. {end})");
    let findings = service.detect_violations(start, end)?;
    if findings.is_empty() {
        println!("- No violations in the window");
        return Ok(());
    }

    for finding in &findings {
        println!(
            "- [{:?}] {:?} by {} (order {}): {}",
            finding.severity,
            finding.kind,
            finding.manager_name.as_deref().unwrap_or("unknown"),
            finding
                .order_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            finding.detail,
        );
    }
    println!("- {} findings total", findings.len());

    Ok(())
}

fn fmt_pct(value: Option<u32>) -> String {
    value
        .map(|pct| format!("{pct}%"))
        .unwrap_or_else(|| "n/a".to_string())
}
