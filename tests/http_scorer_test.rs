use anyhow::Result;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use srs_engine::adapters::http_scorer::ScorerConfig;
use srs_engine::config::build_evaluator;
use srs_engine::domain::model::NextCard;
use srs_engine::domain::ports::Scorer;
use srs_engine::{
    AnswerEvaluator, Card, CardId, EngineConfig, FixedClock, HttpScorer, InMemoryStore, OwnerId,
    Quality, ReviewEngine, ReviewError, ReviewType,
};
use std::sync::Arc;
use std::time::Duration;

fn scorer_for(server: &MockServer, timeout: Duration) -> HttpScorer {
    HttpScorer::new(ScorerConfig {
        endpoint: server.url("/v1"),
        api_key: Some("sk-test".to_string()),
        model: "grader-test".to_string(),
        timeout,
    })
    .expect("scorer client builds")
}

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_scorer_posts_chat_completion_with_bearer_auth() -> Result<()> {
    let server = MockServer::start_async().await;
    let grade = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .body_contains("grader-test")
                .body_contains("Expected answer: the house")
                .body_contains("Learner answer: a home");
            then.status(200).json_body(chat_reply(
                r#"{"quality": 2, "confidence": 0.9, "rationale": "Same meaning, different word"}"#,
            ));
        })
        .await;

    let scorer = scorer_for(&server, Duration::from_secs(5));
    assert!(scorer.is_available());
    assert_eq!(scorer.name(), "grader-test");

    let verdict = scorer.score("the house", "a home").await?;
    grade.assert_async().await;
    assert_eq!(verdict.quality, Quality::Good);
    assert_eq!(verdict.confidence, 0.9);
    assert_eq!(verdict.rationale, "Same meaning, different word");
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_reported_as_unavailable() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500).body("upstream exploded");
        })
        .await;

    let err = scorer_for(&server, Duration::from_secs(5))
        .score("cat", "cat")
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::ExternalScorerUnavailable { .. }));
    assert!(err.to_string().contains("500"));
    Ok(())
}

#[tokio::test]
async fn test_scorer_honours_configured_client_timeout() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(chat_reply(r#"{"quality": 3, "confidence": 1.0}"#));
        })
        .await;

    let scorer = scorer_for(&server, Duration::from_millis(200));
    let started = std::time::Instant::now();
    let err = scorer.score("la luna", "the moon").await.unwrap_err();

    assert!(matches!(err, ReviewError::ExternalScorerUnavailable { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[tokio::test]
async fn test_evaluator_falls_back_on_unusable_reply() -> Result<()> {
    let server = MockServer::start_async().await;
    let grade = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(chat_reply("Looks right to me, nice work!"));
        })
        .await;

    let evaluator = AnswerEvaluator::new(
        Box::new(scorer_for(&server, Duration::from_secs(5))),
        Duration::from_secs(5),
    );
    let evaluation = evaluator.evaluate("the cat", "The cat!").await;

    grade.assert_async().await;
    assert!(!evaluation.scored_by_external_model);
    assert_eq!(evaluation.quality, Quality::Easy);
    assert!(evaluation.is_correct);
    Ok(())
}

#[tokio::test]
async fn test_evaluator_falls_back_when_scorer_is_slow() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(chat_reply(r#"{"quality": 0, "confidence": 1.0}"#));
        })
        .await;

    let evaluator = AnswerEvaluator::new(
        Box::new(scorer_for(&server, Duration::from_secs(30))),
        Duration::from_millis(200),
    );
    let evaluation = evaluator.evaluate("el perro", "el perro").await;

    assert!(!evaluation.scored_by_external_model);
    assert_eq!(evaluation.quality, Quality::Easy);
    Ok(())
}

#[tokio::test]
async fn test_typed_review_uses_configured_scorer() -> Result<()> {
    let server = MockServer::start_async().await;
    let grade = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Expected answer: to run");
            then.status(200).json_body(chat_reply(
                "```json\n{\"quality\": 1, \"confidence\": 0.7, \"rationale\": \"Wrong tense\"}\n```",
            ));
        })
        .await;

    let config = EngineConfig::from_toml_str(&format!(
        r#"
[scorer]
enabled = true
endpoint = "{}"
api_key = "sk-test"
timeout_ms = 5000
"#,
        server.url("/v1")
    ))?;
    let evaluator = build_evaluator(&config);
    assert!(evaluator.has_external_scorer());

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
    let owner = OwnerId::new("learner-7")?;
    let card = Card::new(CardId::new("verb-1"), owner.clone(), "correr", "to run", now)?;
    let engine = ReviewEngine::new(
        InMemoryStore::with_cards(vec![card]),
        evaluator,
        Arc::new(FixedClock::new(now)),
    )
    .with_fixed_direction(ReviewType::Recognition);

    let presented = match engine.next_card(&owner).await? {
        NextCard::Card { flashcard, .. } => flashcard,
        NextCard::Completed { .. } => panic!("card should be due"),
    };
    let typed = engine
        .submit_typed_answer(&owner, &presented.id, "ran")
        .await?;

    grade.assert_async().await;
    assert!(typed.ai_score.scored_by_external_model);
    assert_eq!(typed.ai_score.quality, Quality::Hard);
    assert_eq!(typed.ai_score.rationale, "Wrong tense");
    assert!(!typed.is_correct);
    assert!(typed.completed);

    assert!(engine.next_card(&owner).await?.is_completed());
    let summary = engine.end_session(&owner).await;
    assert_eq!(summary.incorrect_count, 1);
    Ok(())
}
