//! One learner's pass through a snapshot of their due cards.
//!
//! The queue is fixed when the session starts, so a card rescheduled out of
//! "due" mid-session does not disappear from the current pass. At most one
//! card is outstanding at a time. A typed answer is saved with the scored
//! quality right away and stays outstanding until the learner moves on or
//! overrides the score. An override recomputes from the state the card had
//! before the review, so every response leaves exactly one reschedule behind.

use crate::core::evaluator::AnswerEvaluator;
use crate::core::scheduler;
use crate::domain::model::{
    AiScore, Card, CardId, Evaluation, NextCard, OwnerId, PresentedCard, Quality, Response,
    ReviewOutcome, ReviewType, SchedulingState, SessionSummary, TypedOutcome,
};
use crate::domain::ports::CardStore;
use crate::utils::error::{ReviewError, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

/// How the question direction is picked for each card.
#[derive(Debug, Clone)]
pub enum DirectionPolicy {
    Random(StdRng),
    Fixed(ReviewType),
}

impl DirectionPolicy {
    pub fn random() -> Self {
        DirectionPolicy::Random(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        DirectionPolicy::Random(StdRng::seed_from_u64(seed))
    }

    fn pick(&mut self) -> ReviewType {
        match self {
            DirectionPolicy::Random(rng) => {
                if rng.random_bool(0.5) {
                    ReviewType::Recognition
                } else {
                    ReviewType::Recall
                }
            }
            DirectionPolicy::Fixed(review_type) => *review_type,
        }
    }
}

/// Either outcome of [`ReviewSession::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Applied(ReviewOutcome),
    Scored(TypedOutcome),
}

/// A saved typed score, kept so an override can replace it.
#[derive(Debug, Clone)]
struct Scored {
    evaluation: Evaluation,
    before: SchedulingState,
}

#[derive(Debug, Clone)]
struct Outstanding {
    card_id: CardId,
    review_type: ReviewType,
    scored: Option<Scored>,
}

pub struct ReviewSession {
    owner: OwnerId,
    remaining: VecDeque<CardId>,
    current: Option<Outstanding>,
    review_types: HashMap<CardId, ReviewType>,
    direction: DirectionPolicy,
    total_reviewed: usize,
    correct_count: usize,
    incorrect_count: usize,
}

impl ReviewSession {
    /// `due` must already be in presentation order.
    pub fn start(owner: OwnerId, due: Vec<Card>, direction: DirectionPolicy) -> Self {
        tracing::info!("📚 Review session started for {} with {} due cards", owner, due.len());
        Self {
            owner,
            remaining: due.into_iter().map(|card| card.id).collect(),
            current: None,
            review_types: HashMap::new(),
            direction,
            total_reviewed: 0,
            correct_count: 0,
            incorrect_count: 0,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn current_card(&self) -> Option<&CardId> {
        self.current.as_ref().map(|outstanding| &outstanding.card_id)
    }

    /// True while a typed score is saved but can still be overridden.
    pub fn awaiting_confirmation(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|outstanding| outstanding.scored.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty() && self.current.is_none()
    }

    pub fn summary(&self) -> SessionSummary {
        let unanswered = self
            .current
            .as_ref()
            .is_some_and(|outstanding| outstanding.scored.is_none());
        SessionSummary {
            total_reviewed: self.total_reviewed,
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
            remaining: self.remaining.len() + usize::from(unanswered),
        }
    }

    /// Serves the outstanding card, or advances to the next one.
    ///
    /// A typed score waiting for confirmation is kept as saved. An unanswered
    /// outstanding card is presented again unchanged.
    pub async fn next_card<S: CardStore>(&mut self, store: &S) -> Result<NextCard> {
        if let Some(outstanding) = self.current.clone() {
            if outstanding.scored.is_none() {
                let card = self.load_owned(store, &outstanding.card_id).await?;
                return Ok(NextCard::Card {
                    flashcard: PresentedCard::hiding_tested_side(&card, outstanding.review_type),
                    remaining: self.remaining.len(),
                });
            }
            self.current = None;
        }

        Ok(match self.advance(store).await? {
            Some(flashcard) => NextCard::Card {
                flashcard,
                remaining: self.remaining.len(),
            },
            None => NextCard::completed(),
        })
    }

    pub async fn submit<S: CardStore>(
        &mut self,
        store: &S,
        evaluator: &AnswerEvaluator,
        card_id: &CardId,
        response: Response,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome> {
        match response {
            Response::Rated(quality) => self
                .submit_rated(store, card_id, quality, now)
                .await
                .map(SubmitOutcome::Applied),
            Response::Typed(answer) => self
                .submit_typed(store, evaluator, card_id, &answer, now)
                .await
                .map(SubmitOutcome::Scored),
        }
    }

    /// Traditional mode: the learner's own rating is applied immediately.
    pub async fn submit_rated<S: CardStore>(
        &mut self,
        store: &S,
        card_id: &CardId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let outstanding = self.addressed(store, card_id).await?;
        if outstanding.scored.is_some() {
            return Err(ReviewError::AlreadyAnswered {
                card_id: card_id.to_string(),
            });
        }

        let card = self.load_owned(store, card_id).await?;
        reschedule(store, card_id, quality, &card.schedule, now).await?;
        self.record(None);
        self.current = None;
        Ok(self.advance_outcome(store, None).await)
    }

    /// Typed mode: scores the answer and saves the scored quality. The card
    /// stays outstanding so the learner can still override the score.
    ///
    /// `completed` reports whether the session ends once this response is
    /// settled.
    pub async fn submit_typed<S: CardStore>(
        &mut self,
        store: &S,
        evaluator: &AnswerEvaluator,
        card_id: &CardId,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<TypedOutcome> {
        let outstanding = self.addressed(store, card_id).await?;
        if outstanding.scored.is_some() {
            return Err(ReviewError::AlreadyAnswered {
                card_id: card_id.to_string(),
            });
        }

        let card = self.load_owned(store, card_id).await?;
        let expected = card.expected_answer(outstanding.review_type);
        let evaluation = evaluator.evaluate(expected, answer).await;

        if !evaluation.scored_by_external_model {
            tracing::info!("Backup scoring used for card {}", card_id);
        }

        reschedule(store, card_id, evaluation.quality, &card.schedule, now).await?;
        self.record(Some(evaluation.is_correct));

        let outcome = TypedOutcome {
            is_correct: evaluation.is_correct,
            correct_answer: expected.to_string(),
            user_answer: answer.to_string(),
            ai_score: AiScore {
                quality: evaluation.quality,
                confidence: evaluation.confidence,
                rationale: evaluation.rationale.clone(),
                scored_by_external_model: evaluation.scored_by_external_model,
            },
            remaining: self.remaining.len(),
            completed: self.remaining.is_empty(),
        };

        if let Some(current) = self.current.as_mut() {
            current.scored = Some(Scored {
                evaluation,
                before: card.schedule,
            });
        }
        Ok(outcome)
    }

    /// Replaces a saved typed score with the learner's own rating. The card
    /// is rescheduled from its pre-review state, so the scored quality leaves
    /// no trace. Correctness follows the chosen rating.
    pub async fn override_quality<S: CardStore>(
        &mut self,
        store: &S,
        card_id: &CardId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let outstanding = self.addressed(store, card_id).await?;
        let Some(scored) = outstanding.scored else {
            return Err(ReviewError::OverrideNotAllowed {
                card_id: card_id.to_string(),
            });
        };

        let is_correct = quality.is_passing();
        reschedule(store, card_id, quality, &scored.before, now).await?;

        self.uncount(scored.evaluation.is_correct);
        self.count(is_correct);
        self.current = None;
        Ok(self.advance_outcome(store, Some(is_correct)).await)
    }

    /// Ends the session. Every response given so far is already saved.
    pub fn end(self) -> SessionSummary {
        let summary = self.summary();
        tracing::info!(
            "🏁 Review session ended for {}: {} reviewed ({} correct, {} incorrect), {} left",
            self.owner,
            summary.total_reviewed,
            summary.correct_count,
            summary.incorrect_count,
            summary.remaining
        );
        summary
    }

    fn record(&mut self, is_correct: Option<bool>) {
        self.total_reviewed += 1;
        if let Some(is_correct) = is_correct {
            self.count(is_correct);
        }
    }

    fn count(&mut self, is_correct: bool) {
        if is_correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
    }

    fn uncount(&mut self, was_correct: bool) {
        if was_correct {
            self.correct_count = self.correct_count.saturating_sub(1);
        } else {
            self.incorrect_count = self.incorrect_count.saturating_sub(1);
        }
    }

    /// The response is already saved here, so a failed read of the next card
    /// only leaves `next_card` empty; the caller fetches it with `next_card`.
    async fn advance_outcome<S: CardStore>(
        &mut self,
        store: &S,
        is_correct: Option<bool>,
    ) -> ReviewOutcome {
        match self.advance(store).await {
            Ok(next_card) => ReviewOutcome {
                is_correct,
                remaining: self.remaining.len(),
                completed: next_card.is_none(),
                next_card,
            },
            Err(e) => {
                tracing::warn!("⚠️ Review saved but the next card could not be loaded: {}", e);
                ReviewOutcome {
                    is_correct,
                    remaining: self.remaining.len(),
                    completed: false,
                    next_card: None,
                }
            }
        }
    }

    /// Pops queued ids until one still resolves to an owned card.
    async fn advance<S: CardStore>(&mut self, store: &S) -> Result<Option<PresentedCard>> {
        debug_assert!(self.current.is_none());

        while let Some(card_id) = self.remaining.pop_front() {
            let card = match store.get(&card_id).await {
                Ok(Some(card)) if card.is_owned_by(&self.owner) => card,
                Ok(_) => {
                    tracing::warn!("Card {} is no longer available, skipping", card_id);
                    continue;
                }
                Err(e) => {
                    // 讀取失敗時放回佇列，讓呼叫端重試
                    self.remaining.push_front(card_id);
                    return Err(e);
                }
            };

            let direction = &mut self.direction;
            let review_type = *self
                .review_types
                .entry(card_id.clone())
                .or_insert_with(|| direction.pick());

            self.current = Some(Outstanding {
                card_id,
                review_type,
                scored: None,
            });
            return Ok(Some(PresentedCard::hiding_tested_side(&card, review_type)));
        }

        Ok(None)
    }

    /// Checks that `card_id` is the card awaiting a response.
    async fn addressed<S: CardStore>(&self, store: &S, card_id: &CardId) -> Result<Outstanding> {
        match &self.current {
            Some(outstanding) if &outstanding.card_id == card_id => Ok(outstanding.clone()),
            current => {
                self.load_owned(store, card_id).await?;
                match current {
                    Some(outstanding) => Err(ReviewError::CardNotCurrent {
                        expected: outstanding.card_id.to_string(),
                        got: card_id.to_string(),
                    }),
                    None => Err(ReviewError::NoCurrentCard),
                }
            }
        }
    }

    async fn load_owned<S: CardStore>(&self, store: &S, card_id: &CardId) -> Result<Card> {
        load_owned_card(store, &self.owner, card_id).await
    }
}

/// Writes the state that follows `quality` applied to `from`.
async fn reschedule<S: CardStore>(
    store: &S,
    card_id: &CardId,
    quality: Quality,
    from: &SchedulingState,
    now: DateTime<Utc>,
) -> Result<()> {
    let next = scheduler::next_state(quality, from, now);

    if let Err(e) = store.update_schedule(card_id, &next).await {
        tracing::error!("❌ Failed to save review of card {}: {}", card_id, e);
        return Err(e);
    }

    tracing::debug!(
        "Card {} rated {}: interval {} -> {} days, ease {:.2}, due {}",
        card_id,
        quality,
        from.interval,
        next.interval,
        next.ease_factor,
        next.due_date
    );
    Ok(())
}

/// Reads a card, treating another owner's card as unknown.
pub async fn load_owned_card<S: CardStore>(
    store: &S,
    owner: &OwnerId,
    card_id: &CardId,
) -> Result<Card> {
    match store.get(card_id).await? {
        Some(card) if card.is_owned_by(owner) => Ok(card),
        _ => Err(ReviewError::CardNotFound {
            card_id: card_id.to_string(),
        }),
    }
}
