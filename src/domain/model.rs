use crate::utils::error::{ReviewError, Result};
use crate::utils::validation::validate_non_empty_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 2.5;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl TryFrom<String> for OwnerId {
    type Error = ReviewError;

    fn try_from(id: String) -> Result<Self> {
        Self::new(id)
    }
}

impl From<OwnerId> for String {
    fn from(owner: OwnerId) -> Self {
        owner.0
    }
}

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_non_empty_string("owner_id", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recall-difficulty rating given by the learner or the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum Quality {
    Again = 0,
    Hard = 1,
    Good = 2,
    Easy = 3,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Again, Quality::Hard, Quality::Good, Quality::Easy];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Good 以上視為答對，會累加連續成功次數
    pub fn is_passing(self) -> bool {
        self >= Quality::Good
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Again => "Again",
            Quality::Hard => "Hard",
            Quality::Good => "Good",
            Quality::Easy => "Easy",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Quality::Again),
            1 => Ok(Quality::Hard),
            2 => Ok(Quality::Good),
            3 => Ok(Quality::Easy),
            _ => Err(ReviewError::InvalidQuality { value }),
        }
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.value()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.value())
    }
}

/// Scheduling half of a card. Only the scheduler produces new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingState {
    pub interval: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl SchedulingState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            interval: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
            due_date: now,
            last_reviewed: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub owner_id: OwnerId,
    pub prompt: String,
    pub answer: String,
    #[serde(flatten)]
    pub schedule: SchedulingState,
}

impl Card {
    pub fn new(
        id: CardId,
        owner_id: OwnerId,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_non_empty_string("card.id", id.as_str())?;
        let prompt = prompt.into();
        let answer = answer.into();
        validate_non_empty_string("card.prompt", &prompt)?;
        validate_non_empty_string("card.answer", &answer)?;

        Ok(Self {
            id,
            owner_id,
            prompt,
            answer,
            schedule: SchedulingState::fresh(now),
        })
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_due(now)
    }

    /// The side the learner has to produce for the given direction.
    pub fn expected_answer(&self, review_type: ReviewType) -> &str {
        match review_type {
            ReviewType::Recognition => &self.answer,
            ReviewType::Recall => &self.prompt,
        }
    }
}

/// Which side of the card is withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    /// 顯示題目，要求輸入答案
    Recognition,
    /// 顯示答案，要求回想題目
    Recall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    #[default]
    Typed,
    Traditional,
}

impl std::str::FromStr for ReviewMode {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typed" => Ok(ReviewMode::Typed),
            "traditional" => Ok(ReviewMode::Traditional),
            other => Err(ReviewError::InvalidConfigValueError {
                field: "session.mode".to_string(),
                value: other.to_string(),
                reason: "Expected 'typed' or 'traditional'".to_string(),
            }),
        }
    }
}

/// A learner's answer to the outstanding card.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Free text, scored by the evaluator.
    Typed(String),
    /// Self-rated quality, the traditional button flow.
    Rated(Quality),
}

/// What a scorer says about one typed answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerVerdict {
    pub quality: Quality,
    pub confidence: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub is_correct: bool,
    pub quality: Quality,
    pub confidence: f64,
    pub scored_by_external_model: bool,
    pub rationale: String,
}

impl Evaluation {
    pub fn from_verdict(verdict: ScorerVerdict, scored_by_external_model: bool) -> Self {
        Self {
            is_correct: verdict.quality.is_passing(),
            quality: verdict.quality,
            confidence: verdict.confidence.clamp(0.0, 1.0),
            scored_by_external_model,
            rationale: verdict.rationale,
        }
    }
}

/// A card as shown to the learner: the tested side is left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedCard {
    pub id: CardId,
    pub review_type: ReviewType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl PresentedCard {
    pub fn hiding_tested_side(card: &Card, review_type: ReviewType) -> Self {
        let (prompt, answer) = match review_type {
            ReviewType::Recognition => (Some(card.prompt.clone()), None),
            ReviewType::Recall => (None, Some(card.answer.clone())),
        };
        Self {
            id: card.id.clone(),
            review_type,
            prompt,
            answer,
        }
    }

    pub fn question(&self) -> &str {
        self.prompt
            .as_deref()
            .or(self.answer.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCount {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextCard {
    Card {
        flashcard: PresentedCard,
        remaining: usize,
    },
    Completed {
        completed: bool,
    },
}

impl NextCard {
    pub fn completed() -> Self {
        NextCard::Completed { completed: true }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, NextCard::Completed { .. })
    }
}

/// Result of a response that was applied to the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub remaining: usize,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_card: Option<PresentedCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiScore {
    pub quality: Quality,
    pub confidence: f64,
    pub rationale: String,
    pub scored_by_external_model: bool,
}

/// Result of a typed answer. The reschedule is held until the learner keeps
/// the score or overrides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub user_answer: String,
    pub ai_score: AiScore,
    pub remaining: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_reviewed: usize,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub remaining: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_card() -> Card {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Card::new(
            CardId::new("c1"),
            OwnerId::new("learner").unwrap(),
            "mitochondria",
            "powerhouse of the cell",
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_new_card_lifecycle_defaults() {
        let card = sample_card();
        assert_eq!(card.schedule.interval, 1);
        assert_eq!(card.schedule.ease_factor, 2.5);
        assert_eq!(card.schedule.repetitions, 0);
        assert_eq!(card.schedule.last_reviewed, None);
        assert!(card.is_due(card.schedule.due_date));
    }

    #[test]
    fn test_owner_id_cannot_be_empty() {
        assert!(OwnerId::new("").is_err());
        assert!(OwnerId::new("  ").is_err());
    }

    #[test]
    fn test_card_document_with_blank_owner_is_rejected() {
        let mut document = serde_json::to_value(sample_card()).unwrap();
        assert_eq!(document["ownerId"], "learner");

        document["ownerId"] = serde_json::json!("");
        assert!(serde_json::from_value::<Card>(document.clone()).is_err());

        document["ownerId"] = serde_json::json!("learner-2");
        let card: Card = serde_json::from_value(document).unwrap();
        assert_eq!(card.owner_id.as_str(), "learner-2");
    }

    #[test]
    fn test_quality_rejects_out_of_range() {
        assert_eq!(Quality::try_from(2).unwrap(), Quality::Good);
        assert!(matches!(
            Quality::try_from(4),
            Err(ReviewError::InvalidQuality { value: 4 })
        ));
        assert!(matches!(
            Quality::try_from(-1),
            Err(ReviewError::InvalidQuality { value: -1 })
        ));
    }

    #[test]
    fn test_quality_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Quality::Easy).unwrap(), "3");
        let parsed: Quality = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Quality::Hard);
        assert!(serde_json::from_str::<Quality>("9").is_err());
    }

    #[test]
    fn test_presented_card_hides_tested_side() {
        let card = sample_card();

        let recognition = PresentedCard::hiding_tested_side(&card, ReviewType::Recognition);
        assert_eq!(recognition.prompt.as_deref(), Some("mitochondria"));
        assert_eq!(recognition.answer, None);
        assert_eq!(card.expected_answer(ReviewType::Recognition), "powerhouse of the cell");

        let recall = PresentedCard::hiding_tested_side(&card, ReviewType::Recall);
        assert_eq!(recall.prompt, None);
        assert_eq!(recall.question(), "powerhouse of the cell");
        assert_eq!(card.expected_answer(ReviewType::Recall), "mitochondria");
    }

    #[test]
    fn test_next_card_wire_shape() {
        let json = serde_json::to_value(NextCard::completed()).unwrap();
        assert_eq!(json, serde_json::json!({ "completed": true }));
    }
}
