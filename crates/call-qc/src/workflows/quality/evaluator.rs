use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{OrderId, OrderScore, Violation, SYNTHETIC_ORDER_FLOOR};
use super::facts::{collect_facts, FactBundle};
use super::repository::{QualityRepository, RepositoryError};
use super::scoring::{calc_scores, ScoreSummary};
use super::script::{ScriptBundle, ScriptEvaluator};
use super::sla::{check_sla, Clock, SlaBundle, SystemClock};
use super::violations;

const DEFAULT_BATCH_LIMIT: usize = 100;
const THROTTLE_EVERY: usize = 5;
const THROTTLE_PAUSE: Duration = Duration::from_millis(800);

/// Batch request: either one specific order, or the freshest working-status
/// orders up to `limit`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BatchRequest {
    pub limit: Option<usize>,
    pub order_id: Option<OrderId>,
}

/// Batch outcome surfaced to callers as "N processed, M errors".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed: u32,
    pub errors: u32,
}

/// Errors escaping the evaluation pipeline. Missing data never lands
/// here; only the store does.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Facade sequencing fact collection, SLA checks, AI script evaluation,
/// and score aggregation for one order, and batching that pipeline across
/// the working set. Also forwards to the violation engine so the HTTP
/// layer has a single entry point.
pub struct QualityService<R> {
    repository: Arc<R>,
    script: ScriptEvaluator,
    clock: Arc<dyn Clock>,
}

impl<R: QualityRepository> QualityService<R> {
    pub fn new(repository: Arc<R>, script: ScriptEvaluator) -> Self {
        Self::with_clock(repository, script, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, script: ScriptEvaluator, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            script,
            clock,
        }
    }

    /// Evaluate one order and upsert its score row. Re-running with
    /// unchanged data overwrites the row with identical fields. A failed
    /// persist propagates: a silently lost score would be a correctness
    /// bug, not a degraded input.
    pub async fn evaluate_order(&self, order_id: OrderId) -> Result<OrderScore, EvaluationError> {
        let facts = collect_facts(self.repository.as_ref(), order_id)?;
        let order = self.repository.order(order_id)?;
        let sla = check_sla(order.as_ref(), facts.lead_received_at, self.clock.as_ref());
        let script = self.script.evaluate(&facts.transcript_history).await;
        let summary = calc_scores(&facts, &sla, &script);

        let score = assemble_score(order_id, &facts, &sla, &script, &summary);
        self.repository.upsert_score(score.clone())?;

        info!(
            order = %order_id,
            deal_pct = ?summary.deal_score_pct,
            script_pct = ?summary.script_score_pct,
            total = ?summary.total_score,
            "order scored"
        );

        Ok(score)
    }

    /// Evaluate a batch sequentially. One bad order never aborts the run:
    /// its failure is counted and the loop continues. A short pause every
    /// few orders keeps the AI collaborator and store within rate limits.
    pub async fn run_full_evaluation(
        &self,
        request: BatchRequest,
    ) -> Result<BatchOutcome, EvaluationError> {
        let targets: Vec<OrderId> = match request.order_id {
            Some(order_id) => vec![order_id],
            None => {
                let book = self.repository.status_book()?;
                let limit = request.limit.unwrap_or(DEFAULT_BATCH_LIMIT);
                self.repository
                    .orders_in_statuses(&book.working_statuses, limit)?
                    .into_iter()
                    .map(|order| order.id)
                    .filter(|order_id| order_id.0 < SYNTHETIC_ORDER_FLOOR)
                    .collect()
            }
        };

        let mut outcome = BatchOutcome::default();
        for (attempted, order_id) in targets.into_iter().enumerate() {
            match self.evaluate_order(order_id).await {
                Ok(_) => outcome.processed += 1,
                Err(error) => {
                    warn!(order = %order_id, %error, "order evaluation failed, continuing batch");
                    outcome.errors += 1;
                }
            }

            if (attempted + 1) % THROTTLE_EVERY == 0 {
                tokio::time::sleep(THROTTLE_PAUSE).await;
            }
        }

        Ok(outcome)
    }

    /// Scan calls and order history in `[start, end]` for rule breaches.
    pub fn detect_violations(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Violation>, EvaluationError> {
        Ok(violations::detect_violations(
            self.repository.as_ref(),
            self.clock.as_ref(),
            start,
            end,
        )?)
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }
}

fn assemble_score(
    order_id: OrderId,
    facts: &FactBundle,
    sla: &SlaBundle,
    script: &ScriptBundle,
    summary: &ScoreSummary,
) -> OrderScore {
    OrderScore {
        order_id,
        manager_id: facts.manager_id,
        order_status: facts.order_status.clone(),
        lead_received_at: facts.lead_received_at,

        technical_spec_received: facts.technical_spec_received,
        buyer_filled: facts.buyer_filled,
        product_category_filled: facts.product_category_filled,
        contact_data_present: facts.contact_data_present,
        relevant_number_found: facts.relevant_number_found,
        expected_amount_present: facts.expected_amount_present,
        purchase_form_present: facts.purchase_form_present,
        industry_present: facts.industry_present,
        has_comment_event: facts.has_comment_event,
        email_sent_after_missed_call: facts.email_sent_after_missed_call,

        call_status: facts.call_status.clone(),
        total_call_duration: facts.total_call_duration.clone(),
        outgoing_call_count: facts.outgoing_call_count,
        transcribed_call_count: facts.transcribed_call_count,
        first_contact_latency: facts.first_contact_latency.clone(),

        lead_in_work_lt_1_day: sla.lead_in_work_lt_1_day,
        next_contact_not_overdue: sla.next_contact_not_overdue,
        lead_in_work_lt_1_day_after_tz: sla.lead_in_work_lt_1_day_after_tz,
        deal_in_status_lt_5_days: sla.deal_in_status_lt_5_days,

        greeting: script.greeting,
        stated_call_purpose: script.stated_call_purpose,
        company_info_discovery: script.company_info_discovery,
        deadline_discovery: script.deadline_discovery,
        spec_confirmation: script.spec_confirmation,
        objection_handling_price: script.objection_handling_price,
        objection_handling_terms: script.objection_handling_terms,
        advantage_quality: script.advantage_quality,
        advantage_logistics: script.advantage_logistics,
        advantage_service: script.advantage_service,
        cross_sell: script.cross_sell,
        next_step_agreement: script.next_step_agreement,
        dialogue_control: script.dialogue_control,
        speech_quality: script.speech_quality,
        evaluator_comment: script.evaluator_comment.clone(),

        deal_score: summary.deal_score,
        deal_score_pct: summary.deal_score_pct,
        script_score: summary.script_score,
        script_score_pct: summary.script_score_pct,
        total_score: summary.total_score,
    }
}
