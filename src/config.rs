//! Run configuration.
//!
//! [`Config`] is built once at startup from the parsed [`Cli`] and handed to
//! each component by reference. Nothing else in the crate reads the process
//! environment.
//!
//! Credentials are optional at load time. A stage that needs a missing one
//! asks for it through an accessor and gets a
//! [`ConfigError::MissingCredential`] naming the variable.

use crate::attempts::{BoundedAttempts, CandidateOrder};
use crate::cli::Cli;
use crate::error::ConfigError;
use crate::models::SourceCatalog;
use crate::utils::mask_secret;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const FACEBOOK_PAGE_ID_VAR: &str = "FACEBOOK_PAGE_ID";
pub const FACEBOOK_PAGE_ACCESS_TOKEN_VAR: &str = "FACEBOOK_PAGE_ACCESS_TOKEN";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Everything a run needs, resolved up front.
#[derive(Clone)]
pub struct Config {
    gemini_api_key: Option<String>,
    facebook_page_id: Option<String>,
    facebook_page_access_token: Option<String>,
    pub catalog: SourceCatalog,
    pub max_attempts: usize,
    pub order: CandidateOrder,
    pub http_timeout: Duration,
    pub generation_retries: usize,
    pub model: String,
    pub gemini_api_base: String,
    pub graph_api_base: String,
    pub dry_run: bool,
    pub report_json: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &self.gemini_api_key.as_deref().map(mask_secret))
            .field("facebook_page_id", &self.facebook_page_id)
            .field(
                "facebook_page_access_token",
                &self.facebook_page_access_token.as_deref().map(mask_secret),
            )
            .field("catalog", &self.catalog.len())
            .field("max_attempts", &self.max_attempts)
            .field("order", &self.order)
            .field("http_timeout", &self.http_timeout)
            .field("generation_retries", &self.generation_retries)
            .field("model", &self.model)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Accepted shapes of a `--feeds-file`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedsFile {
    List(Vec<String>),
    Doc { feeds: Vec<String> },
}

impl Config {
    /// Build the configuration from parsed CLI arguments.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or invalid feeds file, an empty catalog, a zero
    /// attempt cap or a bad API base. Missing credentials are *not* an error
    /// here.
    #[instrument(level = "info", skip_all)]
    pub async fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let catalog = match &cli.feeds_file {
            Some(path) => load_catalog(path).await?,
            None => SourceCatalog::builtin(),
        };
        info!(feeds = catalog.len(), custom = cli.feeds_file.is_some(), "Loaded feed catalog");
        Self::with_catalog(cli, catalog)
    }

    /// Build the configuration around an already loaded catalog.
    ///
    /// # Errors
    ///
    /// Fails on a zero attempt cap or an API base that is not an absolute
    /// http(s) URL.
    pub fn with_catalog(cli: &Cli, catalog: SourceCatalog) -> Result<Self, ConfigError> {
        if cli.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        validate_api_base("--gemini-api-base", &cli.gemini_api_base)?;
        validate_api_base("--graph-api-base", &cli.graph_api_base)?;

        Ok(Self {
            gemini_api_key: non_empty(cli.gemini_api_key.as_deref()),
            facebook_page_id: non_empty(cli.facebook_page_id.as_deref()),
            facebook_page_access_token: non_empty(cli.facebook_page_access_token.as_deref()),
            catalog,
            max_attempts: cli.max_attempts,
            order: if cli.no_shuffle {
                CandidateOrder::AsListed
            } else {
                CandidateOrder::Shuffled
            },
            http_timeout: Duration::from_secs(cli.http_timeout_secs.max(1)),
            generation_retries: cli.generation_retries,
            model: cli.model.clone(),
            gemini_api_base: cli.gemini_api_base.clone(),
            graph_api_base: cli.graph_api_base.clone(),
            dry_run: cli.dry_run,
            report_json: cli.report_json.clone(),
        })
    }

    pub fn gemini_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.gemini_api_key, GEMINI_API_KEY_VAR)
    }

    pub fn facebook_page_id(&self) -> Result<&str, ConfigError> {
        require(&self.facebook_page_id, FACEBOOK_PAGE_ID_VAR)
    }

    pub fn facebook_page_access_token(&self) -> Result<&str, ConfigError> {
        require(&self.facebook_page_access_token, FACEBOOK_PAGE_ACCESS_TOKEN_VAR)
    }

    /// The acquisition policy for this run.
    pub fn attempt_policy(&self) -> BoundedAttempts {
        BoundedAttempts::new(self.max_attempts, self.order)
    }

    /// Shared HTTP client with the configured timeout.
    pub fn http_client(&self) -> Result<Client, ConfigError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.http_timeout.min(Duration::from_secs(10)))
            .timeout(self.http_timeout)
            .build()?;
        Ok(client)
    }

    /// Which credentials are set, with secrets masked.
    pub fn check_environment(&self) -> Vec<CredentialStatus> {
        vec![
            CredentialStatus::secret(GEMINI_API_KEY_VAR, self.gemini_api_key.as_deref()),
            CredentialStatus {
                name: FACEBOOK_PAGE_ID_VAR,
                present: self.facebook_page_id.is_some(),
                shown: self.facebook_page_id.clone(),
            },
            CredentialStatus::secret(
                FACEBOOK_PAGE_ACCESS_TOKEN_VAR,
                self.facebook_page_access_token.as_deref(),
            ),
        ]
    }
}

/// One line of the `--check-env` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub name: &'static str,
    pub present: bool,
    /// Masked secret or plain identifier; `None` when absent.
    pub shown: Option<String>,
}

impl CredentialStatus {
    fn secret(name: &'static str, value: Option<&str>) -> Self {
        Self {
            name,
            present: value.is_some(),
            shown: value.map(mask_secret),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .ok_or(ConfigError::MissingCredential { name })
}

/// An API root must be an absolute http(s) URL that can take path segments.
fn validate_api_base(name: &'static str, base: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidApiBase {
        name,
        url: base.to_string(),
        reason,
    };
    let url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("cannot take a path".to_string()));
    }
    Ok(())
}

/// Read and validate a YAML feeds file.
///
/// Either a bare list of URIs or a mapping with a `feeds` list.
pub async fn load_catalog(path: &Path) -> Result<SourceCatalog, ConfigError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::FeedsFile {
            path: display.clone(),
            source,
        })?;
    let parsed: FeedsFile =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::FeedsFileFormat {
            path: display,
            source,
        })?;
    let uris = match parsed {
        FeedsFile::List(uris) => uris,
        FeedsFile::Doc { feeds } => feeds,
    };
    SourceCatalog::new(uris)
}


#[cfg(test)]
mod tests {
    use super::testing::{builtin, cli, config_with_credentials};
    use super::*;

    #[test]
    fn test_credentials_resolved() {
        let config = config_with_credentials();
        assert_eq!(config.gemini_api_key().unwrap(), "gem-key-0001");
        assert_eq!(config.facebook_page_id().unwrap(), "424242");
        assert_eq!(config.facebook_page_access_token().unwrap(), "page-token-7777");
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let cli = Cli {
            facebook_page_id: Some("   ".to_string()),
            ..cli()
        };
        let config = builtin(&cli);
        let err = config.facebook_page_id().unwrap_err();
        assert!(err.to_string().contains(FACEBOOK_PAGE_ID_VAR));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let config = config_with_credentials();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("gem-key-0001"));
        assert!(!dbg.contains("page-token-7777"));
        assert!(dbg.contains("...0001"));
    }

    #[test]
    fn test_check_environment_masks() {
        let report = config_with_credentials().check_environment();
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].shown.as_deref(), Some("...0001"));
        assert_eq!(report[1].shown.as_deref(), Some("424242"));
        assert_eq!(report[2].shown.as_deref(), Some("...7777"));
        assert!(report.iter().all(|c| c.present));
    }

    #[test]
    fn test_no_shuffle_sets_order() {
        let cli = Cli {
            no_shuffle: true,
            max_attempts: 2,
            ..cli()
        };
        let policy = builtin(&cli).attempt_policy();
        assert_eq!(policy.order(), CandidateOrder::AsListed);
        assert_eq!(policy.max_attempts(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let cli = Cli {
            max_attempts: 0,
            ..cli()
        };
        assert!(matches!(
            Config::from_cli(&cli).await,
            Err(ConfigError::ZeroAttempts)
        ));
    }

    #[test]
    fn test_missing_credentials_are_named() {
        let config = builtin(&cli());
        let errs = [
            config.gemini_api_key().unwrap_err(),
            config.facebook_page_id().unwrap_err(),
            config.facebook_page_access_token().unwrap_err(),
        ];
        assert!(errs[0].to_string().contains(GEMINI_API_KEY_VAR));
        assert!(errs[1].to_string().contains(FACEBOOK_PAGE_ID_VAR));
        assert!(errs[2].to_string().contains(FACEBOOK_PAGE_ACCESS_TOKEN_VAR));
        assert!(config.check_environment().iter().all(|c| !c.present));
    }

    #[test]
    fn test_invalid_graph_api_base_rejected() {
        for bad in ["not a url", "mailto:pages@example.com", "ftp://graph.example"] {
            let cli = Cli {
                graph_api_base: bad.to_string(),
                ..cli()
            };
            match Config::with_catalog(&cli, SourceCatalog::builtin()) {
                Err(ConfigError::InvalidApiBase { name, url, .. }) => {
                    assert_eq!(name, "--graph-api-base");
                    assert_eq!(url, bad);
                }
                other => panic!("expected InvalidApiBase for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_gemini_api_base_rejected() {
        let cli = Cli {
            gemini_api_base: "generativelanguage".to_string(),
            ..cli()
        };
        assert!(matches!(
            Config::with_catalog(&cli, SourceCatalog::builtin()),
            Err(ConfigError::InvalidApiBase { name: "--gemini-api-base", .. })
        ));
    }

    #[test]
    fn test_versioned_graph_api_base_accepted() {
        let cli = Cli {
            graph_api_base: "https://graph.facebook.com/v19.0/".to_string(),
            ..cli()
        };
        let config = builtin(&cli);
        assert_eq!(config.graph_api_base, "https://graph.facebook.com/v19.0/");
    }

    #[tokio::test]
    async fn test_load_catalog_list_and_doc() {
        let dir = std::env::temp_dir().join(format!("feed_poster_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let list = dir.join("list.yaml");
        std::fs::write(&list, "- https://a.example/feed\n- https://b.example/rss\n").unwrap();
        let catalog = load_catalog(&list).await.unwrap();
        assert_eq!(catalog.uris(), &["https://a.example/feed", "https://b.example/rss"]);

        let doc = dir.join("doc.yaml");
        std::fs::write(&doc, "feeds:\n  - https://c.example/atom\n").unwrap();
        let catalog = load_catalog(&doc).await.unwrap();
        assert_eq!(catalog.len(), 1);

        let bad = dir.join("bad.yaml");
        std::fs::write(&bad, "feeds: 12\n").unwrap();
        assert!(matches!(
            load_catalog(&bad).await,
            Err(ConfigError::FeedsFileFormat { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_load_catalog_missing_file() {
        let err = load_catalog(Path::new("/definitely/not/here.yaml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::FeedsFile { .. }));
    }
}
