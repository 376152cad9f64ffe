//! Error types for each stage of the posting pipeline.
//!
//! Every stage has its own enum so a failure can be attributed to the stage
//! that produced it. None of these escalate to a process-level crash; the
//! pipeline records them in the [`RunReport`](crate::pipeline::RunReport).

use thiserror::Error;

/// Configuration and startup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: environment variable {name} is not set")]
    MissingCredential { name: &'static str },

    #[error("invalid feed URI {uri:?}: {reason}")]
    InvalidFeedUri { uri: String, reason: String },

    #[error("invalid {name} {url:?}: {reason}")]
    InvalidApiBase {
        name: &'static str,
        url: String,
        reason: String,
    },

    #[error("feed catalog is empty")]
    EmptyCatalog,

    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    #[error("failed to read feeds file {path}: {source}")]
    FeedsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feeds file {path}: {source}")]
    FeedsFileFormat {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A single candidate feed could not be used. Never fatal on its own.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("feed responded with HTTP {0}")]
    Status(u16),

    #[error("not a syndication document: {0}")]
    Parse(String),

    #[error("feed parsed but has no entries")]
    Empty,
}

/// The generation capability failed or returned something unusable.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation service returned no text")]
    EmptyResponse,
}

/// The publish capability failed. Delivery is attempted at most once.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("publish request failed: {0}")]
    Transport(String),

    #[error("page rejected the post with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
