//! Sales-call quality control: deterministic fact collection, SLA checks,
//! AI script evaluation, score aggregation, and the compliance violation
//! engine, held together by [`QualityService`].

pub mod domain;
pub(crate) mod evaluator;
pub(crate) mod facts;
pub mod repository;
pub mod router;
pub mod rules;
pub(crate) mod scoring;
pub mod script;
pub(crate) mod sla;
pub(crate) mod violations;

#[cfg(test)]
mod tests;

pub use domain::{
    CallDirection, CallRecord, ManagerId, Order, OrderHistoryEvent, OrderId, OrderScore, Severity,
    StatusBook, Violation, ViolationKind, SYNTHETIC_ORDER_FLOOR,
};
pub use evaluator::{BatchOutcome, BatchRequest, EvaluationError, QualityService};
pub use facts::{collect_facts, FactBundle};
pub use repository::{QualityRepository, RepositoryError};
pub use router::{quality_router, ScoreView};
pub use rules::{RuleCondition, RuleContext, RuleDefinition, RuleFinding, RuleTrigger, TimeAnchor};
pub use scoring::{calc_scores, ScoreSummary};
pub use script::{
    DisabledScriptModel, HttpScriptModel, ScriptBundle, ScriptEvaluator, ScriptModel,
    ScriptModelError,
};
pub use sla::{check_sla, Clock, SlaBundle, SystemClock};
pub use violations::detect_violations;
