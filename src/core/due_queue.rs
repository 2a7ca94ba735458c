use crate::domain::model::{Card, OwnerId};
use crate::domain::ports::CardStore;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};

/// Selects the cards an owner should review, oldest-overdue first.
pub struct DueQueue<'a, S: CardStore> {
    store: &'a S,
}

impl<'a, S: CardStore> DueQueue<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// 篩選 `due_date <= now` 的卡片，依到期時間遞增排序，同時間以卡片 id 排序
    pub async fn due_set(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .store
            .due_cards(owner, now)
            .await?
            .into_iter()
            .filter(|card| card.is_owned_by(owner) && card.is_due(now))
            .collect();

        sort_due(&mut cards);

        tracing::debug!("{} cards due for {} at {}", cards.len(), owner, now);
        Ok(cards)
    }

    pub async fn due_count(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<usize> {
        self.store.count_due(owner, now).await
    }
}

pub fn sort_due(cards: &mut [Card]) {
    cards.sort_by(|a, b| {
        a.schedule
            .due_date
            .cmp(&b.schedule.due_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryStore;
    use crate::domain::model::CardId;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn card(id: &str, owner: &str, due: DateTime<Utc>) -> Card {
        let mut card = Card::new(
            CardId::new(id),
            OwnerId::new(owner).unwrap(),
            format!("prompt {}", id),
            format!("answer {}", id),
            t0(),
        )
        .unwrap();
        card.schedule.due_date = due;
        card
    }

    #[tokio::test]
    async fn test_due_set_is_sorted_and_filtered() {
        let store = InMemoryStore::with_cards(vec![
            card("c", "alice", t0() - Duration::hours(1)),
            card("a", "alice", t0() - Duration::days(3)),
            card("b", "alice", t0()),
            card("late", "alice", t0() + Duration::seconds(1)),
            card("other", "bob", t0() - Duration::days(10)),
        ]);
        let owner = OwnerId::new("alice").unwrap();

        let due = DueQueue::new(&store).due_set(&owner, t0()).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(due
            .windows(2)
            .all(|w| w[0].schedule.due_date <= w[1].schedule.due_date));
    }

    #[tokio::test]
    async fn test_ties_are_broken_by_card_id() {
        let store = InMemoryStore::with_cards(vec![
            card("z", "alice", t0()),
            card("m", "alice", t0()),
            card("b", "alice", t0()),
        ]);
        let owner = OwnerId::new("alice").unwrap();

        let due = DueQueue::new(&store).due_set(&owner, t0()).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "m", "z"]);
    }

    #[tokio::test]
    async fn test_due_count_matches_due_set() {
        let store = InMemoryStore::with_cards(vec![
            card("a", "alice", t0()),
            card("b", "alice", t0() + Duration::seconds(1)),
            card("c", "alice", t0() - Duration::minutes(5)),
        ]);
        let owner = OwnerId::new("alice").unwrap();
        let queue = DueQueue::new(&store);

        assert_eq!(queue.due_count(&owner, t0()).await.unwrap(), 2);
        assert_eq!(queue.due_set(&owner, t0()).await.unwrap().len(), 2);
    }
}
