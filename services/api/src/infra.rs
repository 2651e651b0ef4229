use chrono::{DateTime, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use call_qc::workflows::quality::{
    CallDirection, CallRecord, ManagerId, Order, OrderHistoryEvent, OrderId, OrderScore,
    QualityRepository, RepositoryError, StatusBook,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct QualityStore {
    orders: BTreeMap<OrderId, Order>,
    calls: Vec<CallRecord>,
    call_orders: BTreeMap<i64, OrderId>,
    history: Vec<OrderHistoryEvent>,
    managers: BTreeMap<ManagerId, String>,
    book: StatusBook,
    controlled: BTreeSet<ManagerId>,
    scores: BTreeMap<OrderId, OrderScore>,
}

/// Process-local store backing the service; the CRM and telephony sync jobs
/// that would feed a persistent store live outside this binary.
#[derive(Default, Clone)]
pub(crate) struct InMemoryQualityRepository {
    store: Arc<Mutex<QualityStore>>,
}

impl InMemoryQualityRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, QualityStore> {
        self.store.lock().expect("repository mutex poisoned")
    }

    /// A small but complete dataset: three managers, orders in different
    /// statuses, matched calls with transcripts, and the history rows the
    /// violation engine feeds on.
    pub(crate) fn seeded() -> Self {
        let repo = Self::default();
        {
            let mut store = repo.lock();

            store.book = StatusBook {
                new_statuses: BTreeSet::from(["novyi".to_string()]),
                qualified_status: "zayavka-otkalifitsirovana".to_string(),
                cancel_statuses: BTreeSet::from(["otmenen".to_string()]),
                working_statuses: BTreeSet::from([
                    "novyi".to_string(),
                    "zayavka-otkalifitsirovana".to_string(),
                    "v-rabote".to_string(),
                ]),
            };

            store.managers.insert(ManagerId(1), "Анна Смирнова".to_string());
            store.managers.insert(ManagerId(2), "Игорь Петров".to_string());
            store.managers.insert(ManagerId(3), "Ольга Козлова".to_string());

            // A worked lead with a long real conversation.
            let mut custom = BTreeMap::new();
            custom.insert("contact_phone".to_string(), serde_json::json!("+79001234567"));
            custom.insert("expected_amount".to_string(), serde_json::json!("480000"));
            custom.insert("industry".to_string(), serde_json::json!("metallurgy"));
            store.orders.insert(
                OrderId(101),
                Order {
                    id: OrderId(101),
                    status: "v-rabote".to_string(),
                    manager_id: Some(ManagerId(1)),
                    created_at: at(2025, 6, 2, 9, 0),
                    updated_at: at(2025, 6, 4, 15, 30),
                    custom,
                },
            );
            store.call_orders.insert(1001, OrderId(101));
            store.calls.push(CallRecord {
                id: 1001,
                direction: CallDirection::Outgoing,
                started_at: at(2025, 6, 2, 10, 15),
                duration_secs: 340,
                recording_url: None,
                transcript: Some(
                    "Добрый день! Это Анна из компании Металлоснаб. Звоню по вашей \
                     заявке на листовой прокат: уточните, пожалуйста, объём и сроки \
                     поставки, чтобы мы подготовили предложение."
                        .to_string(),
                ),
                answering_machine: false,
            });

            // A lead qualified without any real conversation behind it.
            store.orders.insert(
                OrderId(102),
                Order {
                    id: OrderId(102),
                    status: "zayavka-otkalifitsirovana".to_string(),
                    manager_id: Some(ManagerId(2)),
                    created_at: at(2025, 6, 3, 8, 0),
                    updated_at: at(2025, 6, 3, 8, 20),
                    custom: BTreeMap::new(),
                },
            );
            store.call_orders.insert(1002, OrderId(102));
            store.calls.push(CallRecord {
                id: 1002,
                direction: CallDirection::Outgoing,
                started_at: at(2025, 6, 3, 8, 10),
                duration_secs: 12,
                recording_url: None,
                transcript: None,
                answering_machine: false,
            });
            store.history.push(OrderHistoryEvent {
                order_id: OrderId(102),
                field: "status".to_string(),
                old_value: Some("novyi".to_string()),
                new_value: Some("zayavka-otkalifitsirovana".to_string()),
                manager_id: Some(ManagerId(2)),
                occurred_at: at(2025, 6, 3, 8, 20),
            });

            // A missed inbound call on a fresh lead.
            store.orders.insert(
                OrderId(103),
                Order {
                    id: OrderId(103),
                    status: "novyi".to_string(),
                    manager_id: Some(ManagerId(3)),
                    created_at: at(2025, 6, 4, 11, 0),
                    updated_at: at(2025, 6, 4, 11, 0),
                    custom: BTreeMap::new(),
                },
            );
            store.call_orders.insert(1003, OrderId(103));
            store.calls.push(CallRecord {
                id: 1003,
                direction: CallDirection::Incoming,
                started_at: at(2025, 6, 4, 11, 5),
                duration_secs: 0,
                recording_url: None,
                transcript: None,
                answering_machine: false,
            });
        }
        repo
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid seed timestamp")
}

impl QualityRepository for InMemoryQualityRepository {
    fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    fn orders_in_statuses(
        &self,
        statuses: &BTreeSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>, RepositoryError> {
        let store = self.lock();
        let mut orders: Vec<Order> = store
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
        Ok(self
            .lock()
            .calls
            .iter()
            .filter(|call| call.started_at >= start && call.started_at <= end)
            .cloned()
            .collect())
    }

    fn calls_for_order(&self, id: OrderId) -> Result<Vec<CallRecord>, RepositoryError> {
        let store = self.lock();
        Ok(store
            .calls
            .iter()
            .filter(|call| store.call_orders.get(&call.id) == Some(&id))
            .cloned()
            .collect())
    }

    fn order_for_call(&self, call_id: i64) -> Result<Option<OrderId>, RepositoryError> {
        Ok(self.lock().call_orders.get(&call_id).copied())
    }

    fn history_for_order(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>, RepositoryError> {
        Ok(self
            .lock()
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
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|event| event.occurred_at >= start && event.occurred_at <= end)
            .cloned()
            .collect())
    }

    fn manager_directory(&self) -> Result<BTreeMap<ManagerId, String>, RepositoryError> {
        Ok(self.lock().managers.clone())
    }

    fn status_book(&self) -> Result<StatusBook, RepositoryError> {
        Ok(self.lock().book.clone())
    }

    fn controlled_managers(&self) -> Result<BTreeSet<ManagerId>, RepositoryError> {
        Ok(self.lock().controlled.clone())
    }

    fn upsert_score(&self, score: OrderScore) -> Result<(), RepositoryError> {
        self.lock().scores.insert(score.order_id, score);
        Ok(())
    }

    fn score(&self, id: OrderId) -> Result<Option<OrderScore>, RepositoryError> {
        Ok(self.lock().scores.get(&id).cloned())
    }
}
