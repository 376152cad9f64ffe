//! Publishing drafts to a Facebook page.
//!
//! One form-encoded POST to `{graph_api_base}/{page_id}/feed` carrying the
//! post body and the page access token. Any 2xx is success; anything else is
//! a failure whose response body is kept for diagnostics.
//!
//! Delivery is attempted at most once: no retry, no backoff, no idempotency
//! key. A network blip loses the post rather than duplicating it.

use crate::config::{Config, FACEBOOK_PAGE_ACCESS_TOKEN_VAR, FACEBOOK_PAGE_ID_VAR};
use crate::error::{ConfigError, PublishError};
use crate::models::{DraftPost, PublishReceipt};
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument};
use url::Url;

/// Default Graph API root.
pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com";

/// Raw HTTP reply from the page endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends a form POST and hands back whatever came back.
pub trait PageTransport {
    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<HttpReply, PublishError>;
}

/// [`PageTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct GraphApiTransport {
    client: Client,
}

impl GraphApiTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PageTransport for GraphApiTransport {
    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<HttpReply, PublishError> {
        let resp = self
            .client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct GraphPostResponse {
    id: Option<String>,
}

/// Delivers drafts to one page.
pub struct Publisher<T> {
    transport: T,
    graph_api_base: String,
    page_id: Option<String>,
    access_token: Option<String>,
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("graph_api_base", &self.graph_api_base)
            .field("page_id", &self.page_id)
            .finish_non_exhaustive()
    }
}

impl<T: PageTransport> Publisher<T> {
    pub fn from_config(config: &Config, transport: T) -> Self {
        Self {
            transport,
            graph_api_base: config.graph_api_base.clone(),
            page_id: config.facebook_page_id().ok().map(str::to_string),
            access_token: config.facebook_page_access_token().ok().map(str::to_string),
        }
    }

    /// Page feed endpoint, with the page id as its own path segment.
    ///
    /// The base is validated when [`Config`] is built; a bad one still
    /// surfaces as a configuration error.
    fn endpoint(&self, page_id: &str) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidApiBase {
            name: "--graph-api-base",
            url: self.graph_api_base.clone(),
            reason,
        };
        let mut url = Url::parse(&self.graph_api_base).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot take a path".to_string()))?
            .pop_if_empty()
            .push(page_id)
            .push("feed");
        Ok(url)
    }

    /// Publish `post` once and report exactly how it went.
    #[instrument(level = "info", skip_all)]
    pub async fn try_publish(&self, post: &DraftPost) -> Result<PublishReceipt, PublishError> {
        let page_id = self.page_id.as_deref().ok_or(ConfigError::MissingCredential {
            name: FACEBOOK_PAGE_ID_VAR,
        })?;
        let token = self.access_token.as_deref().ok_or(ConfigError::MissingCredential {
            name: FACEBOOK_PAGE_ACCESS_TOKEN_VAR,
        })?;
        let url = self.endpoint(page_id)?;

        info!(page_id, "Publishing to Facebook");
        let t0 = Instant::now();
        let reply = self
            .transport
            .post_form(&url, &[("message", post.body.as_str()), ("access_token", token)])
            .await?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !(200..300).contains(&reply.status) {
            error!(
                status = reply.status,
                elapsed_ms,
                response = %truncate_for_log(&reply.body, 1000),
                "Page rejected the post"
            );
            return Err(PublishError::Rejected {
                status: reply.status,
                body: reply.body,
            });
        }

        let post_id = serde_json::from_str::<GraphPostResponse>(&reply.body)
            .ok()
            .and_then(|r| r.id);
        info!(
            status = reply.status,
            elapsed_ms,
            post_id = ?post_id,
            "Successfully posted to Facebook page"
        );
        Ok(PublishReceipt {
            status: reply.status,
            post_id,
        })
    }

    /// Publish `post` if there is one. Returns `true` only on a 2xx reply.
    pub async fn publish(&self, post: Option<&DraftPost>) -> bool {
        let Some(post) = post else {
            return false;
        };
        match self.try_publish(post).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Error posting to Facebook");
                false
            }
        }
    }
}
