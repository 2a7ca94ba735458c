use crate::domain::model::{Card, CardId, OwnerId, SchedulingState, ScorerVerdict};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Persistence of cards and their scheduling state.
///
/// Writes are last-writer-wins per card; implementations need no cross-card locking.
pub trait CardStore: Send + Sync {
    fn get(&self, id: &CardId) -> impl std::future::Future<Output = Result<Option<Card>>> + Send;

    /// Cards of `owner` with `due_date <= now`, in no particular order.
    fn due_cards(
        &self,
        owner: &OwnerId,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Card>>> + Send;

    fn count_due(
        &self,
        owner: &OwnerId,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;

    fn update_schedule(
        &self,
        id: &CardId,
        schedule: &SchedulingState,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Grades a typed answer against the expected one.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, expected: &str, given: &str) -> Result<ScorerVerdict>;
}

/// Source of "now". Injected everywhere time matters.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait ConfigProvider: Send + Sync {
    fn scorer_enabled(&self) -> bool;
    fn scorer_endpoint(&self) -> Option<&str>;
    fn scorer_api_key(&self) -> Option<&str>;
    fn scorer_model(&self) -> &str;
    fn scorer_timeout(&self) -> Duration;
    fn store_path(&self) -> &str;
    fn session_seed(&self) -> Option<u64>;
}
