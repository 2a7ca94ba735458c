use crate::domain::model::{Card, CardId, OwnerId, SchedulingState};
use crate::domain::ports::CardStore;
use crate::utils::error::{ReviewError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local card store. Clones share the same cards.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    cards: Arc<Mutex<HashMap<CardId, Card>>>,
    failing_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: Vec<Card>) -> Self {
        let cards = cards
            .into_iter()
            .map(|card| (card.id.clone(), card))
            .collect();
        Self {
            cards: Arc::new(Mutex::new(cards)),
            failing_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn insert(&self, card: Card) {
        self.cards.lock().await.insert(card.id.clone(), card);
    }

    pub async fn len(&self) -> usize {
        self.cards.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cards.lock().await.is_empty()
    }

    /// 模擬儲存層故障，之後的寫入都會回傳 StoreUnavailable
    pub fn fail_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }
}

impl CardStore for InMemoryStore {
    async fn get(&self, id: &CardId) -> Result<Option<Card>> {
        Ok(self.cards.lock().await.get(id).cloned())
    }

    async fn due_cards(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Vec<Card>> {
        let cards = self.cards.lock().await;
        Ok(cards
            .values()
            .filter(|card| card.is_owned_by(owner) && card.is_due(now))
            .cloned()
            .collect())
    }

    async fn count_due(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<usize> {
        let cards = self.cards.lock().await;
        Ok(cards
            .values()
            .filter(|card| card.is_owned_by(owner) && card.is_due(now))
            .count())
    }

    async fn update_schedule(&self, id: &CardId, schedule: &SchedulingState) -> Result<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(ReviewError::StoreUnavailable {
                message: format!("write of card {} rejected", id),
            });
        }

        let mut cards = self.cards.lock().await;
        let card = cards.get_mut(id).ok_or_else(|| ReviewError::CardNotFound {
            card_id: id.to_string(),
        })?;
        card.schedule = schedule.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card(id: &str) -> Card {
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        Card::new(CardId::new(id), OwnerId::new("o").unwrap(), "q", "a", now).unwrap()
    }

    #[tokio::test]
    async fn test_update_is_last_writer_wins() {
        let store = InMemoryStore::with_cards(vec![card("c1")]);
        let id = CardId::new("c1");
        let mut schedule = store.get(&id).await.unwrap().unwrap().schedule;

        schedule.interval = 6;
        store.update_schedule(&id, &schedule).await.unwrap();
        schedule.interval = 15;
        store.update_schedule(&id, &schedule).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().unwrap().schedule.interval, 15);
    }

    #[tokio::test]
    async fn test_update_unknown_card() {
        let store = InMemoryStore::new();
        let schedule = card("x").schedule;
        let err = store
            .update_schedule(&CardId::new("x"), &schedule)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::CardNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failing_writes_are_retryable() {
        let store = InMemoryStore::with_cards(vec![card("c1")]);
        let schedule = card("c1").schedule;
        store.fail_writes(true);

        let err = store
            .update_schedule(&CardId::new("c1"), &schedule)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        store.fail_writes(false);
        assert!(store.update_schedule(&CardId::new("c1"), &schedule).await.is_ok());
        assert_eq!(store.len().await, 1);
        assert!(!store.is_empty().await);
    }
}
