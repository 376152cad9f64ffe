//! Post drafting.
//!
//! [`ContentGenerator`] turns a [`RetrievedItem`] into a [`DraftPost`] with a
//! single call to the generation capability. The instruction is a fixed
//! template with the item's title and summary filled in. The reply is trimmed
//! and a "read more" footer with the article link is appended.
//!
//! There is no fallback template and no caching. Whether a failed call is
//! retried is decided by the [`AskAsync`] implementation handed in.

use crate::api::AskAsync;
use crate::error::GenerationError;
use crate::models::{DraftPost, RetrievedItem};
use crate::utils::truncate_for_log;
use tracing::{debug, error, info, instrument};

const PROMPT_TEMPLATE: &str = r#"You are the voice of a popular graphic design Facebook page: a friendly design mentor who gets genuinely excited about clever tips, striking work and useful ideas.

**Audience:** seasoned professionals, design students, hobbyists and people who are simply curious about creative work. Keep the tone warm, approachable and easy to follow. Skip heavy jargon.

**Task:** Using the article below, write one short, lively Facebook post.

**Rules:**
1. Open with a hook: a relatable question or a "Wow!" moment.
2. Explain the single most useful or surprising idea from the article in plain words.
3. Close with a fun, open-ended question anyone can answer.
4. Sound human. A little playfulness or humor is welcome when the topic allows.
5. Add 4-5 friendly, relevant hashtags that mix professional tags (#GraphicDesign, #Typography) with community tags (#DesignInspo, #CreativeLife, #LearnDesign).

**Output only the post body.** No preamble such as "Sure!" or "Here is the post:", no notes after it. The first word of your reply must be the first word of the hook.

---
**Article**
**Title:** {title}
**Summary:** {summary}
---

Write the post now."#;

/// Footer appended to every generated body.
pub const READ_MORE_PREFIX: &str = "\n\nRead the full story here:\n";

/// Fill the prompt template with an item's title and summary.
pub fn build_prompt(item: &RetrievedItem) -> String {
    PROMPT_TEMPLATE
        .replace("{title}", &item.title)
        .replace("{summary}", &item.summary)
}

/// Trim the model's reply and attach the source link.
pub fn finish_post(reply: &str, link: &str) -> DraftPost {
    DraftPost {
        body: format!("{}{READ_MORE_PREFIX}{link}", reply.trim()),
        source_link: link.to_string(),
    }
}

/// Drafts posts through an [`AskAsync`] capability.
#[derive(Debug)]
pub struct ContentGenerator<A> {
    ask: A,
}

impl<A: AskAsync> ContentGenerator<A> {
    pub fn new(ask: A) -> Self {
        Self { ask }
    }

    /// Draft a post for `item`, reporting why it failed if it did.
    #[instrument(level = "info", skip_all, fields(title = %item.title))]
    pub async fn try_generate(&self, item: &RetrievedItem) -> Result<DraftPost, GenerationError> {
        let prompt = build_prompt(item);
        debug!(chars = prompt.len(), "Generating post");

        let reply = self.ask.ask(&prompt).await?;
        if reply.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        let post = finish_post(&reply, &item.link);
        info!(
            chars = post.body.len(),
            preview = %truncate_for_log(&post.body, 80),
            "Post generated"
        );
        Ok(post)
    }

    /// Draft a post, or `None` when there is no item or generation failed.
    ///
    /// Failures are logged, never raised.
    pub async fn generate(&self, item: Option<&RetrievedItem>) -> Option<DraftPost> {
        let item = item?;
        match self.try_generate(item).await {
            Ok(post) => Some(post),
            Err(e) => {
                error!(error = %e, "Error generating content");
                None
            }
        }
    }
}

#[cfg(test)]
impl ContentGenerator<crate::api::testing::ScriptedAsk> {
    pub(crate) fn ask_calls(&self) -> usize {
        self.ask.calls.get()
    }
}
