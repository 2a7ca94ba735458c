use crate::core::due_queue::DueQueue;
use crate::core::evaluator::AnswerEvaluator;
use crate::core::session::{load_owned_card, DirectionPolicy, ReviewSession};
use crate::domain::model::{
    CardId, DueCount, NextCard, OwnerId, Quality, ReviewOutcome, ReviewType, SessionSummary,
    TypedOutcome,
};
use crate::domain::ports::{CardStore, Clock};
use crate::utils::error::{ReviewError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type SharedSession = Arc<Mutex<ReviewSession>>;

/// Entry point for collaborators: due counts, card serving, scoring and
/// rescheduling for any number of learners.
///
/// Each learner has at most one live session. Sessions are locked
/// individually, so one learner waiting on the external scorer never blocks
/// another.
pub struct ReviewEngine<S: CardStore> {
    store: S,
    evaluator: AnswerEvaluator,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    fixed_direction: Option<ReviewType>,
    sessions: Mutex<HashMap<OwnerId, SharedSession>>,
}

impl<S: CardStore> ReviewEngine<S> {
    pub fn new(store: S, evaluator: AnswerEvaluator, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            evaluator,
            clock,
            seed: None,
            fixed_direction: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 指定亂數種子，讓題目方向可重現
    pub fn with_session_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fixed_direction(mut self, review_type: ReviewType) -> Self {
        self.fixed_direction = Some(review_type);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn evaluator(&self) -> &AnswerEvaluator {
        &self.evaluator
    }

    pub async fn due_count(&self, owner: &OwnerId) -> Result<DueCount> {
        let count = DueQueue::new(&self.store)
            .due_count(owner, self.clock.now())
            .await?;
        Ok(DueCount { count })
    }

    /// Snapshots the owner's due set into a new session, replacing any
    /// previous one.
    pub async fn start_session(&self, owner: &OwnerId) -> Result<usize> {
        let session = self.new_session(owner).await?;
        let size = session.remaining();
        self.sessions
            .lock()
            .await
            .insert(owner.clone(), Arc::new(Mutex::new(session)));
        Ok(size)
    }

    /// Starts a session on first use, and a new one once the previous
    /// session has served its last card.
    pub async fn next_card(&self, owner: &OwnerId) -> Result<NextCard> {
        let session = self.session_or_start(owner).await?;
        let mut session = session.lock().await;
        session.next_card(&self.store).await
    }

    pub async fn submit_quality(
        &self,
        owner: &OwnerId,
        card_id: &CardId,
        rating: i64,
    ) -> Result<ReviewOutcome> {
        let quality = Quality::try_from(rating)?;
        let session = self.existing_session(owner, card_id).await?;
        let mut session = session.lock().await;
        session
            .submit_rated(&self.store, card_id, quality, self.clock.now())
            .await
    }

    pub async fn submit_typed_answer(
        &self,
        owner: &OwnerId,
        card_id: &CardId,
        user_answer: &str,
    ) -> Result<TypedOutcome> {
        let session = self.existing_session(owner, card_id).await?;
        let mut session = session.lock().await;
        session
            .submit_typed(
                &self.store,
                &self.evaluator,
                card_id,
                user_answer,
                self.clock.now(),
            )
            .await
    }

    pub async fn override_quality(
        &self,
        owner: &OwnerId,
        card_id: &CardId,
        rating: i64,
    ) -> Result<ReviewOutcome> {
        let quality = Quality::try_from(rating)?;
        let session = self.existing_session(owner, card_id).await?;
        let mut session = session.lock().await;
        session
            .override_quality(&self.store, card_id, quality, self.clock.now())
            .await
    }

    pub async fn session_summary(&self, owner: &OwnerId) -> Option<SessionSummary> {
        let session = self.sessions.lock().await.get(owner).cloned()?;
        let summary = session.lock().await.summary();
        Some(summary)
    }

    /// Ends the owner's session early or after completion. No further store
    /// writes happen for it.
    pub async fn end_session(&self, owner: &OwnerId) -> SessionSummary {
        let Some(session) = self.sessions.lock().await.remove(owner) else {
            return SessionSummary::default();
        };

        match Arc::try_unwrap(session) {
            Ok(session) => session.into_inner().end(),
            // 仍有請求持有此 session，只回報目前的統計
            Err(shared) => shared.lock().await.summary(),
        }
    }

    async fn new_session(&self, owner: &OwnerId) -> Result<ReviewSession> {
        let due = DueQueue::new(&self.store)
            .due_set(owner, self.clock.now())
            .await?;
        let direction = match (self.fixed_direction, self.seed) {
            (Some(review_type), _) => DirectionPolicy::Fixed(review_type),
            (None, Some(seed)) => DirectionPolicy::seeded(seed),
            (None, None) => DirectionPolicy::random(),
        };
        Ok(ReviewSession::start(owner.clone(), due, direction))
    }

    /// Returns the owner's live session. A finished one is replaced by a
    /// fresh snapshot so cards that fell due since then are served.
    async fn session_or_start(&self, owner: &OwnerId) -> Result<SharedSession> {
        let existing = self.sessions.lock().await.get(owner).cloned();
        if let Some(session) = &existing {
            if !session.lock().await.is_complete() {
                return Ok(session.clone());
            }
            tracing::debug!("Session for {} is finished, taking a new snapshot", owner);
        }

        let fresh = Arc::new(Mutex::new(self.new_session(owner).await?));
        let mut sessions = self.sessions.lock().await;
        match (sessions.get(owner), &existing) {
            // 其他請求已先換上新的 session
            (Some(current), Some(old)) if !Arc::ptr_eq(current, old) => Ok(current.clone()),
            (Some(current), None) => Ok(current.clone()),
            _ => {
                sessions.insert(owner.clone(), fresh.clone());
                Ok(fresh)
            }
        }
    }

    async fn existing_session(&self, owner: &OwnerId, card_id: &CardId) -> Result<SharedSession> {
        if let Some(session) = self.sessions.lock().await.get(owner).cloned() {
            return Ok(session);
        }
        load_owned_card(&self.store, owner, card_id).await?;
        Err(ReviewError::NoCurrentCard)
    }
}
