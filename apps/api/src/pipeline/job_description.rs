//! Step 3: job posting text, stripped of markup and cleaned up by the LLM.

use tracing::info;
use url::Url;

use crate::cache::{Artifact, ArtifactCache, ArtifactKind, CacheKey};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, RESUME_ASSISTANT_SYSTEM};
use crate::llm_client::LlmClient;
use crate::pipeline::prompts::JOB_DESCRIPTION_CLEANUP_PROMPT;
use crate::scrape::html::visible_text;
use crate::scrape::{PageFetcher, ScrapeError};

pub async fn fetch_job_description(
    llm: &LlmClient,
    fetcher: &dyn PageFetcher,
    cache: &ArtifactCache,
    url: &Url,
    force: bool,
) -> Result<Artifact, AppError> {
    let key = CacheKey::new(ArtifactKind::JobDescription, &[url.as_str()]);

    cache
        .get_or_compute(&key, force, move || async move {
            let html = fetcher.fetch(url).await?;
            let raw_text = visible_text(&html);
            if raw_text.is_empty() {
                return Err(ScrapeError::Empty {
                    url: url.to_string(),
                }
                .into());
            }
            info!("Scraped {} chars from job posting {}", raw_text.len(), url);

            let prompt =
                fill_template(JOB_DESCRIPTION_CLEANUP_PROMPT, &[("raw_text", raw_text.as_str())]);
            llm.call(&prompt, RESUME_ASSISTANT_SYSTEM)
                .await
                .map_err(|e| AppError::from_llm("Job description cleanup", e))
        })
        .await
}
