//! Step 1: accomplishment list and personal details from the uploaded resume.

use tracing::{info, warn};

use crate::cache::{Artifact, ArtifactCache, ArtifactKind, CacheKey};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM, RESUME_ASSISTANT_SYSTEM};
use crate::llm_client::{parse_json_reply, LlmClient};
use crate::pipeline::prompts::{
    EXTRACT_ACCOMPLISHMENTS_PROMPT, MERGE_ACCOMPLISHMENTS_PROMPT, PERSONAL_DETAILS_PROMPT,
};
use crate::resume::models::PersonalDetails;

/// Merges the resume's accomplishments into `existing` (or extracts them when there is none).
pub async fn gather_accomplishments(
    llm: &LlmClient,
    cache: &ArtifactCache,
    resume_text: &str,
    existing: &str,
    force: bool,
) -> Result<Artifact, AppError> {
    let key = CacheKey::new(ArtifactKind::Accomplishments, &[resume_text, existing]);

    cache
        .get_or_compute(&key, force, move || async move {
            let prompt = if existing.trim().is_empty() {
                fill_template(EXTRACT_ACCOMPLISHMENTS_PROMPT, &[("resume_text", resume_text)])
            } else {
                fill_template(
                    MERGE_ACCOMPLISHMENTS_PROMPT,
                    &[
                        ("existing_accomplishments", existing),
                        ("resume_text", resume_text),
                    ],
                )
            };
            let accomplishments = llm
                .call(&prompt, RESUME_ASSISTANT_SYSTEM)
                .await
                .map_err(|e| AppError::from_llm("Accomplishment extraction", e))?;
            info!("Extracted accomplishments ({} chars)", accomplishments.len());
            Ok(accomplishments)
        })
        .await
}

/// Personal details as JSON; the cached artifact is the normalized serialization.
pub async fn extract_personal_details(
    llm: &LlmClient,
    cache: &ArtifactCache,
    resume_text: &str,
    force: bool,
) -> Result<(PersonalDetails, bool), AppError> {
    let key = CacheKey::new(ArtifactKind::PersonalDetails, &[resume_text]);

    let compute = move || async move {
        let prompt = fill_template(PERSONAL_DETAILS_PROMPT, &[("resume_text", resume_text)]);
        let details: PersonalDetails = llm
            .call_json(&prompt, JSON_ONLY_SYSTEM)
            .await
            .map_err(|e| AppError::from_llm("Personal details extraction", e))?;
        serde_json::to_string(&details).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to serialize personal details: {e}"))
        })
    };

    let artifact = cache.get_or_compute(&key, force, compute).await?;
    match parse_json_reply::<PersonalDetails>(&artifact.content) {
        Ok(details) => Ok((details, artifact.from_cache)),
        Err(e) if artifact.from_cache => {
            warn!("Cached personal details unreadable ({e}); extracting again");
            let fresh = cache.get_or_compute(&key, true, compute).await?;
            let details = parse_json_reply::<PersonalDetails>(&fresh.content)
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
            Ok((details, false))
        }
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(e))),
    }
}
