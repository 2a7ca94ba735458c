use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Invalid quality {value}: expected 0 (again), 1 (hard), 2 (good) or 3 (easy)")]
    InvalidQuality { value: i64 },

    #[error("Card not found: {card_id}")]
    CardNotFound { card_id: String },

    #[error("No card is awaiting a response in this session")]
    NoCurrentCard,

    #[error("Card {got} is not the card awaiting a response ({expected})")]
    CardNotCurrent { expected: String, got: String },

    #[error("Card {card_id} already has a response awaiting confirmation")]
    AlreadyAnswered { card_id: String },

    #[error("Card {card_id} has no typed response that can be overridden")]
    OverrideNotAllowed { card_id: String },

    #[error("External scorer unavailable: {message}")]
    ExternalScorerUnavailable { message: String },

    #[error("Card store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 呼叫端送入的資料不合法，不應重試
    Input,
    /// 與當前複習流程狀態不符
    Session,
    /// 外部依賴（儲存、評分服務）
    External,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReviewError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReviewError::InvalidQuality { .. }
            | ReviewError::CardNotFound { .. }
            | ReviewError::ValidationError { .. } => ErrorCategory::Input,
            ReviewError::NoCurrentCard
            | ReviewError::CardNotCurrent { .. }
            | ReviewError::AlreadyAnswered { .. }
            | ReviewError::OverrideNotAllowed { .. } => ErrorCategory::Session,
            ReviewError::ExternalScorerUnavailable { .. }
            | ReviewError::StoreUnavailable { .. }
            | ReviewError::Http(_) => ErrorCategory::External,
            ReviewError::ConfigValidationError { .. }
            | ReviewError::InvalidConfigValueError { .. }
            | ReviewError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ReviewError::Csv(_) | ReviewError::Io(_) | ReviewError::Serialization(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReviewError::ExternalScorerUnavailable { .. } => ErrorSeverity::Low,
            ReviewError::StoreUnavailable { .. } | ReviewError::Http(_) => ErrorSeverity::Medium,
            ReviewError::Io(_) | ReviewError::Serialization(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 只有儲存層暫時失敗可以原樣重送；其餘都是被拒絕的輸入
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReviewError::StoreUnavailable { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ReviewError::InvalidQuality { .. } => "Rate the card with 0, 1, 2 or 3",
            ReviewError::CardNotFound { .. } => "Check the card id and that it belongs to this learner",
            ReviewError::NoCurrentCard => "Request the next card before submitting a response",
            ReviewError::CardNotCurrent { .. } => "Answer the card that was last presented",
            ReviewError::AlreadyAnswered { .. } => {
                "Keep the suggested score or override it before moving on"
            }
            ReviewError::OverrideNotAllowed { .. } => {
                "Overrides are only accepted right after a typed answer"
            }
            ReviewError::ExternalScorerUnavailable { .. } => {
                "Backup scoring is used automatically; check the scorer endpoint and API key"
            }
            ReviewError::StoreUnavailable { .. } => "Retry the same response; nothing was lost",
            ReviewError::Http(_) => "Check network connectivity and the endpoint URL",
            ReviewError::Csv(_) => "Make sure the file has 'prompt,answer' columns",
            ReviewError::Io(_) => "Check that the file exists and is readable and writable",
            ReviewError::Serialization(_) => "The card file may be corrupted; restore it from a backup",
            ReviewError::ConfigValidationError { .. }
            | ReviewError::InvalidConfigValueError { .. }
            | ReviewError::MissingConfigError { .. } => "Fix the configuration file and try again",
            ReviewError::ValidationError { .. } => "Correct the input and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ReviewError::StoreUnavailable { .. } => {
                "Your answer could not be saved right now. Please try again.".to_string()
            }
            ReviewError::ExternalScorerUnavailable { .. } => {
                "Automatic scoring is unavailable; backup scoring was used.".to_string()
            }
            ReviewError::Io(e) => format!("File access failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_failures_are_retryable() {
        let store = ReviewError::StoreUnavailable {
            message: "disk full".to_string(),
        };
        assert!(store.is_retryable());
        assert_eq!(store.category(), ErrorCategory::External);
        assert_eq!(store.severity(), ErrorSeverity::Medium);

        assert!(!ReviewError::InvalidQuality { value: 7 }.is_retryable());
        assert!(!ReviewError::NoCurrentCard.is_retryable());
        assert!(!ReviewError::CardNotFound {
            card_id: "c1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_rejected_inputs_are_distinguishable() {
        assert_eq!(
            ReviewError::InvalidQuality { value: -1 }.category(),
            ErrorCategory::Input
        );
        assert_eq!(ReviewError::NoCurrentCard.category(), ErrorCategory::Session);
        assert_eq!(
            ReviewError::InvalidQuality { value: 4 }.to_string(),
            "Invalid quality 4: expected 0 (again), 1 (hard), 2 (good) or 3 (easy)"
        );
    }
}
