use clap::Parser;
use srs_engine::config::build_evaluator;
use srs_engine::config::cli::Command;
use srs_engine::core::{CardStore, ConfigProvider};
use srs_engine::domain::model::{NextCard, PresentedCard, ReviewOutcome, SessionSummary};
use srs_engine::utils::error::ErrorSeverity;
use srs_engine::utils::{logger, validation::Validate};
use srs_engine::{
    CliConfig, EngineConfig, JsonFileStore, OwnerId, ReviewEngine, ReviewError, ReviewMode,
    SystemClock,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file is valid TOML");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logging() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli, config).await {
        tracing::error!(
            "❌ srs-review failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

fn load_config(path: &str) -> Result<EngineConfig, ReviewError> {
    if Path::new(path).exists() {
        EngineConfig::from_file(path)
    } else {
        Ok(EngineConfig::default())
    }
}

async fn run(cli: CliConfig, mut config: EngineConfig) -> Result<(), ReviewError> {
    if let Some(store_path) = cli.store {
        config.store.path = store_path;
    }
    let owner = OwnerId::new(cli.owner)?;
    let store = JsonFileStore::new(config.store_path());
    tracing::info!("📁 Cards file: {}", store.path().display());

    match cli.command {
        Command::Due => {
            let engine = ReviewEngine::new(store, build_evaluator(&config), Arc::new(SystemClock));
            let due = engine.due_count(&owner).await?;
            println!("{} card{} due for review", due.count, plural(due.count));
        }
        Command::Import { file } => {
            let reader = std::fs::File::open(&file)?;
            let cards = srs_engine::adapters::csv_import::read_cards(
                reader,
                &owner,
                chrono::Utc::now(),
            )?;
            let written = store.insert_all(cards).await?;
            println!("✅ Imported {} card{} from {}", written, plural(written), file);
        }
        Command::Review { mode } => {
            let mode = mode.unwrap_or_else(|| config.review_mode());
            let engine = ReviewEngine::new(store, build_evaluator(&config), Arc::new(SystemClock))
                .with_session_seed(config.session_seed());
            let summary = review(&engine, &owner, mode).await?;
            print_summary(&summary);
        }
    }

    Ok(())
}

async fn review(
    engine: &ReviewEngine<JsonFileStore>,
    owner: &OwnerId,
    mode: ReviewMode,
) -> Result<SessionSummary, ReviewError> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut next = engine.next_card(owner).await?;

    while let NextCard::Card {
        flashcard,
        remaining,
    } = next
    {
        println!();
        println!("── {} left after this one ──", remaining);
        let advanced = match mode {
            ReviewMode::Traditional => rate_card(engine, owner, &flashcard, &mut input).await?,
            ReviewMode::Typed => type_card(engine, owner, &flashcard, &mut input).await?,
        };
        next = match advanced {
            Some(next) => next,
            None => break,
        };
    }

    if engine
        .session_summary(owner)
        .await
        .is_some_and(|summary| summary.remaining == 0)
    {
        println!("\n🎉 Session complete! No more cards to review right now.");
    }
    Ok(engine.end_session(owner).await)
}

/// Traditional mode. Returns `None` when the learner quits.
async fn rate_card(
    engine: &ReviewEngine<JsonFileStore>,
    owner: &OwnerId,
    flashcard: &PresentedCard,
    input: &mut Input,
) -> Result<Option<NextCard>, ReviewError> {
    print_question(flashcard);
    println!("(press Enter to reveal)");
    if matches!(read_line(input).await?.as_deref(), None | Some("q")) {
        return Ok(None);
    }

    if let Some(card) = engine.store().get(&flashcard.id).await? {
        println!("Answer: {}", card.expected_answer(flashcard.review_type));
    }

    loop {
        println!("How well did you remember? 0 Again · 1 Hard · 2 Good · 3 Easy");
        let Some(line) = read_line(input).await? else {
            return Ok(None);
        };
        if line == "q" {
            return Ok(None);
        }
        let Ok(rating) = line.parse::<i64>() else {
            println!("Please enter a number from 0 to 3");
            continue;
        };

        match engine.submit_quality(owner, &flashcard.id, rating).await {
            Ok(outcome) => return next_after(engine, owner, outcome).await.map(Some),
            Err(e @ ReviewError::InvalidQuality { .. }) => println!("{}", e),
            Err(e) if e.is_retryable() => println!("⚠️ {} Try again.", e.user_friendly_message()),
            Err(e) => return Err(e),
        }
    }
}

/// Typed mode. Returns `None` when the learner quits.
async fn type_card(
    engine: &ReviewEngine<JsonFileStore>,
    owner: &OwnerId,
    flashcard: &PresentedCard,
    input: &mut Input,
) -> Result<Option<NextCard>, ReviewError> {
    print_question(flashcard);
    println!("Your answer:");
    let answer = match read_line(input).await? {
        Some(line) if line != "q" => line,
        _ => return Ok(None),
    };

    let typed = engine
        .submit_typed_answer(owner, &flashcard.id, &answer)
        .await?;
    let verdict = if typed.is_correct { "✅" } else { "❌" };
    println!(
        "{} {} (confidence {:.0}%)",
        verdict,
        typed.ai_score.quality,
        typed.ai_score.confidence * 100.0
    );
    println!("   {}", typed.ai_score.rationale);
    println!("   Correct answer: {}", typed.correct_answer);
    if !typed.ai_score.scored_by_external_model {
        println!("   (backup scoring used)");
    }

    loop {
        println!("Enter to keep this score, or 0-3 to grade it yourself");
        let Some(line) = read_line(input).await? else {
            return Ok(None);
        };
        if line == "q" {
            return Ok(None);
        }
        if line.is_empty() {
            match engine.next_card(owner).await {
                Ok(next) => return Ok(Some(next)),
                Err(e) if e.is_retryable() => {
                    println!("⚠️ {} Try again.", e.user_friendly_message());
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        let Ok(rating) = line.parse::<i64>() else {
            println!("Please enter a number from 0 to 3");
            continue;
        };

        match engine.override_quality(owner, &flashcard.id, rating).await {
            Ok(outcome) => return next_after(engine, owner, outcome).await.map(Some),
            Err(e @ ReviewError::InvalidQuality { .. }) => println!("{}", e),
            Err(e) if e.is_retryable() => println!("⚠️ {} Try again.", e.user_friendly_message()),
            Err(e) => return Err(e),
        }
    }
}

/// Follows a saved response to the next card, fetching it when the outcome
/// could not carry it inline.
async fn next_after(
    engine: &ReviewEngine<JsonFileStore>,
    owner: &OwnerId,
    outcome: ReviewOutcome,
) -> Result<NextCard, ReviewError> {
    match outcome.next_card {
        Some(flashcard) => Ok(NextCard::Card {
            flashcard,
            remaining: outcome.remaining,
        }),
        None if outcome.completed => Ok(NextCard::completed()),
        None => engine.next_card(owner).await,
    }
}

fn print_question(flashcard: &PresentedCard) {
    match (&flashcard.prompt, &flashcard.answer) {
        (Some(prompt), _) => println!("What is the answer to:\n  {}", prompt),
        (None, Some(answer)) => println!("What prompt matches this answer:\n  {}", answer),
        (None, None) => println!("(empty card {})", flashcard.id),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("📊 Reviewed: {}", summary.total_reviewed);
    println!("   Correct: {}  Incorrect: {}", summary.correct_count, summary.incorrect_count);
    println!("   Not reviewed: {}", summary.remaining);
}

async fn read_line(input: &mut Input) -> Result<Option<String>, ReviewError> {
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
