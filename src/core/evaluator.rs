use crate::domain::model::{Evaluation, Quality, ScorerVerdict};
use crate::domain::ports::Scorer;
use crate::utils::error::{ReviewError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_SCORER_TIMEOUT: Duration = Duration::from_secs(8);

const CORRECT_SIMILARITY: f64 = 0.85;
const PARTIAL_SIMILARITY: f64 = 0.5;
const CONTAINMENT_RATIO: f64 = 0.8;

/// Deterministic string comparator used when no external scorer answers.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; always yields a quality on the 0..=3 scale.
    pub fn judge(&self, expected: &str, given: &str) -> ScorerVerdict {
        let expected = normalize_answer(expected);
        let given = normalize_answer(given);

        if given.is_empty() {
            return ScorerVerdict {
                quality: Quality::Again,
                confidence: 1.0,
                rationale: "No answer was given".to_string(),
            };
        }

        if given == expected {
            return ScorerVerdict {
                quality: Quality::Easy,
                confidence: 1.0,
                rationale: "Exact match".to_string(),
            };
        }

        let similarity = similarity(&expected, &given);
        let (quality, rationale) = if similarity >= CORRECT_SIMILARITY {
            (Quality::Good, "Close match with minor differences")
        } else if contains_most_of(&expected, &given) {
            (Quality::Good, "Answer contains nearly all of the expected text")
        } else if similarity >= PARTIAL_SIMILARITY {
            (Quality::Hard, "Partially matches the expected answer")
        } else {
            (Quality::Again, "Does not match the expected answer")
        };

        ScorerVerdict {
            quality,
            confidence: similarity,
            rationale: rationale.to_string(),
        }
    }
}

#[async_trait]
impl Scorer for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, expected: &str, given: &str) -> Result<ScorerVerdict> {
        Ok(self.judge(expected, given))
    }
}

/// Scores typed answers with an optional external scorer, falling back to
/// [`HeuristicScorer`] on error, timeout, or when none is configured.
pub struct AnswerEvaluator {
    primary: Option<Box<dyn Scorer>>,
    fallback: HeuristicScorer,
    timeout: Duration,
}

impl AnswerEvaluator {
    pub fn new(primary: Box<dyn Scorer>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            fallback: HeuristicScorer::new(),
            timeout,
        }
    }

    /// 沒有外部評分服務時只用備援比對
    pub fn heuristic_only() -> Self {
        Self {
            primary: None,
            fallback: HeuristicScorer::new(),
            timeout: DEFAULT_SCORER_TIMEOUT,
        }
    }

    pub fn has_external_scorer(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn evaluate(&self, expected: &str, given: &str) -> Evaluation {
        if let Some(primary) = &self.primary {
            match self.score_with_timeout(primary.as_ref(), expected, given).await {
                Ok(verdict) => {
                    tracing::debug!(
                        "Scorer '{}' graded answer as {} (confidence {:.2})",
                        primary.name(),
                        verdict.quality,
                        verdict.confidence
                    );
                    return Evaluation::from_verdict(verdict, true);
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Scorer '{}' failed, using backup scoring: {}",
                        primary.name(),
                        e
                    );
                }
            }
        }

        Evaluation::from_verdict(self.fallback.judge(expected, given), false)
    }

    async fn score_with_timeout(
        &self,
        scorer: &dyn Scorer,
        expected: &str,
        given: &str,
    ) -> Result<ScorerVerdict> {
        match tokio::time::timeout(self.timeout, scorer.score(expected, given)).await {
            Ok(result) => result,
            Err(_) => Err(ReviewError::ExternalScorerUnavailable {
                message: format!("no verdict within {:?}", self.timeout),
            }),
        }
    }
}

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation pattern"))
}

/// Lowercases, strips punctuation and collapses whitespace.
pub fn normalize_answer(input: &str) -> String {
    let lowered = input.to_lowercase();
    punctuation()
        .replace_all(&lowered, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `1 - distance / longer_length`, in [0, 1].
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn contains_most_of(expected: &str, given: &str) -> bool {
    let expected_len = expected.chars().count();
    let given_len = given.chars().count();
    let ((shorter, shorter_len), (longer, longer_len)) = if expected_len <= given_len {
        ((expected, expected_len), (given, given_len))
    } else {
        ((given, given_len), (expected, expected_len))
    };
    if shorter_len == 0 || !longer.contains(shorter) {
        return false;
    }
    shorter_len as f64 / longer_len as f64 >= CONTAINMENT_RATIO
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
