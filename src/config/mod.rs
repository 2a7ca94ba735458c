#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::http_scorer::{HttpScorer, ScorerConfig};
use crate::core::evaluator::AnswerEvaluator;
use crate::domain::ports::ConfigProvider;

/// Builds the evaluator the configuration asks for. A scorer without an
/// endpoint or API key degrades to backup scoring only.
pub fn build_evaluator<C: ConfigProvider>(config: &C) -> AnswerEvaluator {
    if !config.scorer_enabled() {
        tracing::info!("External scorer disabled, using backup scoring");
        return AnswerEvaluator::heuristic_only();
    }

    let Some(endpoint) = config.scorer_endpoint() else {
        tracing::warn!("⚠️ Scorer enabled without an endpoint, using backup scoring");
        return AnswerEvaluator::heuristic_only();
    };

    let scorer = match HttpScorer::new(ScorerConfig {
        endpoint: endpoint.to_string(),
        api_key: config.scorer_api_key().map(str::to_string),
        model: config.scorer_model().to_string(),
        timeout: config.scorer_timeout(),
    }) {
        Ok(scorer) => scorer,
        Err(e) => {
            tracing::warn!("⚠️ Could not build scorer client, using backup scoring: {}", e);
            return AnswerEvaluator::heuristic_only();
        }
    };

    if !scorer.is_available() {
        tracing::warn!("⚠️ Scorer API key missing, using backup scoring");
        return AnswerEvaluator::heuristic_only();
    }

    tracing::info!(
        "🤖 External scorer '{}' at {} (timeout {:?})",
        config.scorer_model(),
        endpoint,
        config.scorer_timeout()
    );
    AnswerEvaluator::new(Box::new(scorer), config.scorer_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::EngineConfig;

    #[test]
    fn test_disabled_scorer_builds_heuristic_evaluator() {
        let config = EngineConfig::default();
        assert!(!build_evaluator(&config).has_external_scorer());
    }

    #[test]
    fn test_scorer_without_key_degrades() {
        let config = EngineConfig::from_toml_str(
            "[scorer]\nenabled = true\nendpoint = \"https://api.example.com/v1\"\n",
        )
        .unwrap();
        assert!(!build_evaluator(&config).has_external_scorer());
    }

    #[test]
    fn test_configured_scorer_is_used() {
        let config = EngineConfig::from_toml_str(
            "[scorer]\nenabled = true\nendpoint = \"https://api.example.com/v1\"\napi_key = \"sk-1\"\n",
        )
        .unwrap();
        assert!(build_evaluator(&config).has_external_scorer());
    }
}
