use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::workflows::quality::domain::{
    CallDirection, CallRecord, ManagerId, Order, OrderHistoryEvent, OrderId, OrderScore,
    StatusBook,
};
use crate::workflows::quality::repository::{QualityRepository, RepositoryError};
use crate::workflows::quality::script::{ScriptEvaluator, ScriptModel, ScriptModelError};
use crate::workflows::quality::sla::Clock;
use crate::workflows::quality::QualityService;

pub(super) const NEW_STATUS: &str = "novyi";
pub(super) const QUALIFIED_STATUS: &str = "zayavka-otkalifitsirovana";
pub(super) const CANCEL_STATUS: &str = "otmenen";
pub(super) const WORKING_STATUS: &str = "v-rabote";

pub(super) fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("valid RFC3339 timestamp")
}

pub(super) fn status_book() -> StatusBook {
    StatusBook {
        new_statuses: BTreeSet::from([NEW_STATUS.to_string(), "new-lead".to_string()]),
        qualified_status: QUALIFIED_STATUS.to_string(),
        cancel_statuses: BTreeSet::from([
            CANCEL_STATUS.to_string(),
            "nekachestvennyi-lid".to_string(),
        ]),
        working_statuses: BTreeSet::from([
            NEW_STATUS.to_string(),
            "new-lead".to_string(),
            QUALIFIED_STATUS.to_string(),
            WORKING_STATUS.to_string(),
        ]),
    }
}

pub(super) fn order(id: i64, status: &str, manager: Option<i64>, created: &str) -> Order {
    Order {
        id: OrderId(id),
        status: status.to_string(),
        manager_id: manager.map(ManagerId),
        created_at: ts(created),
        updated_at: ts(created),
        custom: BTreeMap::new(),
    }
}

pub(super) fn outgoing_call(id: i64, started: &str, duration_secs: i64) -> CallRecord {
    CallRecord {
        id,
        direction: CallDirection::Outgoing,
        started_at: ts(started),
        duration_secs,
        recording_url: None,
        transcript: None,
        answering_machine: false,
    }
}

pub(super) fn incoming_call(id: i64, started: &str, duration_secs: i64) -> CallRecord {
    CallRecord {
        direction: CallDirection::Incoming,
        ..outgoing_call(id, started, duration_secs)
    }
}

pub(super) fn status_event(
    order_id: i64,
    old: &str,
    new: &str,
    manager: Option<i64>,
    at: &str,
) -> OrderHistoryEvent {
    OrderHistoryEvent {
        order_id: OrderId(order_id),
        field: "status".to_string(),
        old_value: Some(old.to_string()),
        new_value: Some(new.to_string()),
        manager_id: manager.map(ManagerId),
        occurred_at: ts(at),
    }
}

pub(super) fn field_event(
    order_id: i64,
    field: &str,
    manager: Option<i64>,
    at: &str,
) -> OrderHistoryEvent {
    OrderHistoryEvent {
        order_id: OrderId(order_id),
        field: field.to_string(),
        old_value: None,
        new_value: Some("x".to_string()),
        manager_id: manager.map(ManagerId),
        occurred_at: ts(at),
    }
}

#[derive(Default)]
pub(super) struct MemoryState {
    pub orders: BTreeMap<OrderId, Order>,
    pub calls: Vec<CallRecord>,
    pub matches: BTreeMap<i64, OrderId>,
    pub history: Vec<OrderHistoryEvent>,
    pub managers: BTreeMap<ManagerId, String>,
    pub book: StatusBook,
    pub controlled: BTreeSet<ManagerId>,
    pub scores: BTreeMap<OrderId, OrderScore>,
    pub fail_upsert: bool,
}

/// In-memory stand-in for the managed store.
#[derive(Default)]
pub(super) struct MemoryRepository {
    pub(super) state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub(super) fn with_state(state: MemoryState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub(super) fn add_matched_call(&self, call: CallRecord, order_id: i64) {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.matches.insert(call.id, OrderId(order_id));
        state.calls.push(call);
    }

    pub(super) fn stored_score(&self, order_id: i64) -> Option<OrderScore> {
        self.state
            .lock()
            .expect("repository mutex poisoned")
            .scores
            .get(&OrderId(order_id))
            .cloned()
    }
}

impl QualityRepository for MemoryRepository {
    fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.orders.get(&id).cloned())
    }

    fn orders_in_statuses(
        &self,
        statuses: &BTreeSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| statuses.contains(&order.status))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }

    fn calls_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .calls
            .iter()
            .filter(|call| call.started_at >= start && call.started_at <= end)
            .cloned()
            .collect())
    }

    fn calls_for_order(&self, id: OrderId) -> Result<Vec<CallRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .calls
            .iter()
            .filter(|call| state.matches.get(&call.id) == Some(&id))
            .cloned()
            .collect())
    }

    fn order_for_call(&self, call_id: i64) -> Result<Option<OrderId>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.matches.get(&call_id).copied())
    }

    fn history_for_order(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .history
            .iter()
            .filter(|event| event.order_id == id)
            .cloned()
            .collect())
    }

    fn history_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderHistoryEvent>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .history
            .iter()
            .filter(|event| event.occurred_at >= start && event.occurred_at <= end)
            .cloned()
            .collect())
    }

    fn manager_directory(&self) -> Result<BTreeMap<ManagerId, String>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.managers.clone())
    }

    fn status_book(&self) -> Result<StatusBook, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.book.clone())
    }

    fn controlled_managers(&self) -> Result<BTreeSet<ManagerId>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.controlled.clone())
    }

    fn upsert_score(&self, score: OrderScore) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state.fail_upsert {
            return Err(RepositoryError::Unavailable("write refused".to_string()));
        }
        state.scores.insert(score.order_id, score);
        Ok(())
    }

    fn score(&self, id: OrderId) -> Result<Option<OrderScore>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.scores.get(&id).cloned())
    }
}

/// Script-model double that counts invocations and replays a canned
/// response (or a transport failure when none is set).
#[derive(Default)]
pub(super) struct StubScriptModel {
    pub(super) calls: AtomicUsize,
    pub(super) response: Option<String>,
}

impl StubScriptModel {
    pub(super) fn with_response(raw: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Some(raw.to_string()),
        }
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptModel for Arc<StubScriptModel> {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ScriptModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Some(raw) => Ok(raw.clone()),
            None => Err(ScriptModelError::Transport("stub offline".to_string())),
        }
    }
}

/// Clock pinned to one instant so dwell-time rules are deterministic.
pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn service_at(
    repository: Arc<MemoryRepository>,
    model: Arc<StubScriptModel>,
    now: &str,
) -> QualityService<MemoryRepository> {
    QualityService::with_clock(
        repository,
        ScriptEvaluator::new(Box::new(model)),
        Arc::new(FixedClock(ts(now))),
    )
}

/// A transcript long enough to clear the evaluator's 50-character floor.
pub(super) fn long_transcript() -> String {
    "Здравствуйте, меня зовут Алексей, компания Промснаб, удобно говорить?".to_string()
}
