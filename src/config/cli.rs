use crate::domain::model::ReviewMode;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "srs-review")]
#[command(about = "Spaced-repetition review sessions from the terminal")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "srs-config.toml")]
    pub config: String,

    /// Learner whose cards are reviewed
    #[arg(long, env = "SRS_OWNER")]
    pub owner: String,

    /// Override the card file from the configuration
    #[arg(long)]
    pub store: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show how many cards are due now
    Due,
    /// Add cards from a CSV file with prompt,answer columns
    Import { file: String },
    /// Run an interactive review session
    Review {
        /// typed or traditional
        #[arg(long)]
        mode: Option<ReviewMode>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_command() {
        let cli = CliConfig::try_parse_from([
            "srs-review",
            "--owner",
            "sam",
            "review",
            "--mode",
            "traditional",
        ])
        .unwrap();

        assert_eq!(cli.owner, "sam");
        assert_eq!(cli.config, "srs-config.toml");
        assert!(matches!(
            cli.command,
            Command::Review {
                mode: Some(ReviewMode::Traditional)
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let result = CliConfig::try_parse_from([
            "srs-review",
            "--owner",
            "sam",
            "review",
            "--mode",
            "speedrun",
        ]);
        assert!(result.is_err());
    }
}
