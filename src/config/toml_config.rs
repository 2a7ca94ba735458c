use crate::adapters::http_scorer::DEFAULT_MODEL;
use crate::domain::model::ReviewMode;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ReviewError, Result};
use crate::utils::validation::{
    validate_path, validate_range, validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_STORE_PATH: &str = "./cards.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scorer: ScorerSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorerSection {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_STORE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    pub mode: Option<ReviewMode>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub json: bool,
}

impl EngineConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ReviewError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SCORER_API_KEY})，未設定的變數保留原文
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.scorer.enabled {
            let endpoint = validate_required_field("scorer.endpoint", &self.scorer.endpoint)?;
            validate_url("scorer.endpoint", endpoint)?;
        }

        if let Some(timeout_ms) = self.scorer.timeout_ms {
            validate_range("scorer.timeout_ms", timeout_ms, 100, 120_000)?;
        }

        validate_path("store.path", &self.store.path)?;
        Ok(())
    }

    pub fn review_mode(&self) -> ReviewMode {
        self.session.mode.unwrap_or_default()
    }

    pub fn json_logging(&self) -> bool {
        self.logging.json
    }
}

impl ConfigProvider for EngineConfig {
    fn scorer_enabled(&self) -> bool {
        self.scorer.enabled
    }

    fn scorer_endpoint(&self) -> Option<&str> {
        self.scorer.endpoint.as_deref()
    }

    fn scorer_api_key(&self) -> Option<&str> {
        // 未替換的 ${VAR} 視為未設定
        self.scorer
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty() && !key.starts_with("${"))
    }

    fn scorer_model(&self) -> &str {
        self.scorer.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    fn store_path(&self) -> &str {
        &self.store.path
    }

    fn session_seed(&self) -> Option<u64> {
        self.session.seed
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
