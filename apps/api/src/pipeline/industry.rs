//! Step 4: industry label for the role.

use serde::Deserialize;

use crate::cache::{Artifact, ArtifactCache, ArtifactKind, CacheKey};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{parse_json_reply, LlmClient, ModelTier};
use crate::pipeline::prompts::INDUSTRY_PROMPT;

#[derive(Debug, Deserialize)]
struct IndustryLabel {
    industry: String,
}

/// Accepts `{"industry": "..."}`; the label must be short and non-empty.
fn validate_label(reply: &str) -> Result<String, String> {
    let label: IndustryLabel = parse_json_reply(reply)?;
    let industry = label
        .industry
        .trim()
        .trim_end_matches('.')
        .trim_end_matches(" industry")
        .trim()
        .to_string();
    if industry.is_empty() {
        return Err("\"industry\" must not be empty".to_string());
    }
    if industry.split_whitespace().count() > 8 {
        return Err("\"industry\" must be a short label, not a sentence".to_string());
    }
    Ok(industry)
}

pub async fn classify_industry(
    llm: &LlmClient,
    cache: &ArtifactCache,
    job_description: &str,
    company_summary: &str,
    force: bool,
) -> Result<Artifact, AppError> {
    let key = CacheKey::new(ArtifactKind::Industry, &[job_description, company_summary]);

    cache
        .get_or_compute(&key, force, move || async move {
            let prompt = fill_template(
                INDUSTRY_PROMPT,
                &[
                    ("job_description", job_description),
                    ("company_summary", company_summary),
                ],
            );
            llm.call_validated(ModelTier::Standard, &prompt, JSON_ONLY_SYSTEM, validate_label)
                .await
                .map_err(|e| AppError::from_llm("Industry classification", e))
        })
        .await
}
