//! Command-line interface definitions for Feed Poster.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be supplied through an environment variable, which
//! is how the scheduled job passes its credentials.

use crate::api::{DEFAULT_GEMINI_API_BASE, DEFAULT_MODEL};
use crate::publisher::DEFAULT_GRAPH_API_BASE;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Feed Poster application.
///
/// # Examples
///
/// ```sh
/// # Normal scheduled run, credentials from the environment
/// feed_poster
///
/// # Check which credentials are visible to the process
/// feed_poster --check-env
///
/// # Generate a draft from a custom catalog without publishing it
/// feed_poster --feeds-file feeds.yaml --dry-run --report-json ./out/run.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// API key for the text generation service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Facebook page that receives the post
    #[arg(long, env = "FACEBOOK_PAGE_ID")]
    pub facebook_page_id: Option<String>,

    /// Page access token with publish permission
    #[arg(long, env = "FACEBOOK_PAGE_ACCESS_TOKEN", hide_env_values = true)]
    pub facebook_page_access_token: Option<String>,

    /// YAML file listing feed URIs (replaces the built-in catalog)
    #[arg(long, env = "FEEDS_FILE")]
    pub feeds_file: Option<PathBuf>,

    /// Maximum number of distinct feeds to try
    #[arg(long, env = "MAX_FEED_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// Try feeds in catalog order instead of a random order
    #[arg(long)]
    pub no_shuffle: bool,

    /// Timeout in seconds for every HTTP request
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Extra attempts for a failed generation call (0 = fail on first error)
    #[arg(long, env = "GENERATION_RETRIES", default_value_t = 0)]
    pub generation_retries: usize,

    /// Generation model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Root URL of the generation API
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_GEMINI_API_BASE)]
    pub gemini_api_base: String,

    /// Root URL of the Graph API
    #[arg(long, env = "GRAPH_API_BASE", default_value = DEFAULT_GRAPH_API_BASE)]
    pub graph_api_base: String,

    /// Generate the post but do not publish it
    #[arg(long)]
    pub dry_run: bool,

    /// Write the run report as JSON to this path
    #[arg(long, env = "REPORT_JSON")]
    pub report_json: Option<PathBuf>,

    /// Report which credentials are set, then exit
    #[arg(long)]
    pub check_env: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Declared default of an argument, read from the command definition so
    /// exported variables cannot leak in.
    fn declared_default(id: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|a| a.get_id() == id)
            .and_then(|a| a.get_default_values().first().cloned())
            .map(|v| v.to_string_lossy().into_owned())
    }

    #[test]
    fn test_cli_defaults() {
        assert_eq!(declared_default("max_attempts").as_deref(), Some("3"));
        assert_eq!(declared_default("http_timeout_secs").as_deref(), Some("30"));
        assert_eq!(declared_default("generation_retries").as_deref(), Some("0"));
        assert_eq!(declared_default("model").as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(
            declared_default("graph_api_base").as_deref(),
            Some(DEFAULT_GRAPH_API_BASE)
        );
        assert_eq!(declared_default("feeds_file"), None);
        assert_eq!(declared_default("facebook_page_id"), None);
    }

    #[test]
    fn test_credentials_read_from_env_vars() {
        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(|e| e.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("gemini_api_key").as_deref(), Some("GEMINI_API_KEY"));
        assert_eq!(env_of("facebook_page_id").as_deref(), Some("FACEBOOK_PAGE_ID"));
        assert_eq!(
            env_of("facebook_page_access_token").as_deref(),
            Some("FACEBOOK_PAGE_ACCESS_TOKEN")
        );
    }

    #[test]
    fn test_offline_cli_matches_declared_defaults() {
        let cli = crate::config::testing::cli();
        assert_eq!(cli.max_attempts.to_string(), declared_default("max_attempts").unwrap());
        assert_eq!(
            cli.http_timeout_secs.to_string(),
            declared_default("http_timeout_secs").unwrap()
        );
        assert_eq!(
            cli.generation_retries.to_string(),
            declared_default("generation_retries").unwrap()
        );
        assert!(cli.gemini_api_key.is_none());
        assert!(!cli.no_shuffle && !cli.dry_run && !cli.check_env);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "feed_poster",
            "--max-attempts",
            "5",
            "--no-shuffle",
            "--dry-run",
            "--feeds-file",
            "/tmp/feeds.yaml",
            "--report-json",
            "/tmp/run.json",
            "--facebook-page-id",
            "12345",
        ]);

        assert_eq!(cli.max_attempts, 5);
        assert!(cli.no_shuffle);
        assert!(cli.dry_run);
        assert_eq!(cli.feeds_file, Some(PathBuf::from("/tmp/feeds.yaml")));
        assert_eq!(cli.report_json, Some(PathBuf::from("/tmp/run.json")));
        assert_eq!(cli.facebook_page_id.as_deref(), Some("12345"));
    }
}
