use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::domain::{
    CallRecord, ManagerId, Order, OrderHistoryEvent, OrderId, OrderScore, StatusBook,
};

/// Storage abstraction over the managed data store so the engines can be
/// exercised against in-memory doubles. Sync jobs populate the store; this
/// crate only reads it, apart from the score upsert.
pub trait QualityRepository: Send + Sync {
    fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders currently in one of the given statuses, most recently
    /// created first, up to `limit`.
    fn orders_in_statuses(
        &self,
        statuses: &BTreeSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Calls whose start time falls in `[start, end]` inclusive.
    fn calls_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, RepositoryError>;

    /// Calls associated with an order by the external phone-number match.
    /// A call absent from that association never reaches order-scoped rules.
    fn calls_for_order(&self, id: OrderId) -> Result<Vec<CallRecord>, RepositoryError>;

    fn order_for_call(&self, call_id: i64) -> Result<Option<OrderId>, RepositoryError>;

    fn history_for_order(&self, id: OrderId) -> Result<Vec<OrderHistoryEvent>, RepositoryError>;

    /// History events whose timestamp falls in `[start, end]` inclusive.
    fn history_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderHistoryEvent>, RepositoryError>;

    fn manager_directory(&self) -> Result<BTreeMap<ManagerId, String>, RepositoryError>;

    fn status_book(&self) -> Result<StatusBook, RepositoryError>;

    /// Manager allow-list for the violations dashboard. An empty set means
    /// every manager is controlled; only a non-empty set restricts output.
    fn controlled_managers(&self) -> Result<BTreeSet<ManagerId>, RepositoryError>;

    /// Insert-or-overwrite keyed by order id. Re-evaluation is a
    /// destructive overwrite; no score history is retained.
    fn upsert_score(&self, score: OrderScore) -> Result<(), RepositoryError>;

    fn score(&self, id: OrderId) -> Result<Option<OrderScore>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
