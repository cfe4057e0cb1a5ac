//! Step 5: the structured resume itself. Never cached; each generation writes a fresh one.

use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{parse_json_reply, LlmClient, ModelTier};
use crate::pipeline::prompts::RESUME_TEXT_PROMPT;
use crate::resume::models::{PersonalDetails, StructuredResume};

pub struct ResumeInputs<'a> {
    pub job_description: &'a str,
    pub company_summary: &'a str,
    pub accomplishments: &'a str,
    pub industry: &'a str,
    pub personal_details: &'a PersonalDetails,
}

fn validate_resume(reply: &str) -> Result<StructuredResume, String> {
    let value: Value = parse_json_reply(reply)?;
    StructuredResume::from_llm_value(value)
}

/// Generates the tailored resume. Extracted personal details always win over
/// whatever the model put in `personal_info`.
pub async fn generate_resume_text(
    llm: &LlmClient,
    tier: ModelTier,
    inputs: &ResumeInputs<'_>,
) -> Result<StructuredResume, AppError> {
    let personal_details = serde_json::to_string_pretty(inputs.personal_details)
        .map_err(|e| AppError::Internal(e.into()))?;
    let prompt = fill_template(
        RESUME_TEXT_PROMPT,
        &[
            ("industry", inputs.industry),
            ("job_description", inputs.job_description),
            ("company_summary", inputs.company_summary),
            ("accomplishments", inputs.accomplishments),
            ("personal_details", personal_details.as_str()),
        ],
    );

    info!("Generating resume text with model {}", llm.model(tier));
    let mut resume = llm
        .call_validated(tier, &prompt, JSON_ONLY_SYSTEM, validate_resume)
        .await
        .map_err(|e| AppError::from_llm("Resume generation", e))?;

    if !inputs.personal_details.is_empty() {
        resume.personal_info = inputs.personal_details.clone();
    }
    info!(
        "Generated resume: {} jobs, {} projects, {} education entries, {} skills",
        resume.work_experience.len(),
        resume.personal_projects.len(),
        resume.education.len(),
        resume.skills.len()
    );
    Ok(resume)
}
