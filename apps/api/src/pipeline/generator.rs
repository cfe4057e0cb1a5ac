//! Resume generation: orchestrates the full pipeline.
//!
//! Flow: read uploads → accomplishments + personal details → company summary →
//!       job description → industry → structured resume → render + persist.
//!
//! Steps 1–4 go through the artifact cache; `force_run_all` skips cache reads
//! but still writes fresh results back. With `semantic_search` on, only the
//! accomplishments closest to the job description reach step 5.

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::cache::{Artifact, ArtifactCache};
use crate::document::{extension, extract_upload_text};
use crate::errors::AppError;
use crate::llm_client::{LlmClient, ModelTier};
use crate::pipeline::accomplishments::{extract_personal_details, gather_accomplishments};
use crate::pipeline::company::{summarize_company, CompanyRequest};
use crate::pipeline::industry::classify_industry;
use crate::pipeline::job_description::fetch_job_description;
use crate::pipeline::resume_text::{generate_resume_text, ResumeInputs};
use crate::pipeline::retrieval::select_relevant_accomplishments;
use crate::resume::store::{GenerationContext, ResumeStore, StoredResume};
use crate::scrape::PageFetcher;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Borrowed handles to everything the pipeline talks to.
pub struct PipelineDeps<'a> {
    pub llm: &'a LlmClient,
    pub fetcher: &'a dyn PageFetcher,
    pub cache: &'a ArtifactCache,
    pub store: &'a ResumeStore,
    pub company_token_budget: usize,
    /// Accomplishment chunks kept by semantic search.
    pub semantic_top_k: usize,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub resume_file: UploadedFile,
    pub accomplishments_file: Option<UploadedFile>,
    pub job_description_link: Url,
    pub company_base_link: Url,
    pub company_name: Option<String>,
    pub force_run_all: bool,
    pub semantic_search: bool,
    pub model_tier: ModelTier,
}

/// Whether a step's artifact was reused or produced by this run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepReport {
    pub step: &'static str,
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub generation_id: Uuid,
    pub stored: StoredResume,
    pub docx: Vec<u8>,
    pub steps: Vec<StepReport>,
}

// ────────────────────────────────────────────────────────────────────────────
// Generation pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs steps 1–6 and replaces the stored "current" resume with the result.
pub async fn generate_resume(
    deps: &PipelineDeps<'_>,
    request: GenerationRequest,
) -> Result<GenerationOutcome, AppError> {
    let generation_id = Uuid::new_v4();
    let force = request.force_run_all;
    let mut steps = Vec::new();
    info!(
        "Generation {generation_id}: starting (force_run_all={force}, model={})",
        deps.llm.model(request.model_tier)
    );

    // Uploads
    if extension(&request.resume_file.file_name).as_deref() != Some("docx") {
        return Err(AppError::Validation(
            "Resume file must be in .docx format".to_string(),
        ));
    }
    let resume_text = read_upload("resume_file", request.resume_file).await?;
    if resume_text.is_empty() {
        return Err(AppError::Validation(
            "Resume file contains no readable text".to_string(),
        ));
    }
    let existing_accomplishments = match request.accomplishments_file {
        Some(file) => read_upload("accomplishments_file", file).await?,
        None => String::new(),
    };

    // Step 1: accomplishments and personal details
    let accomplishments = gather_accomplishments(
        deps.llm,
        deps.cache,
        &resume_text,
        &existing_accomplishments,
        force,
    )
    .await?;
    record(&mut steps, "accomplishments", &accomplishments);

    let (personal_details, details_cached) =
        extract_personal_details(deps.llm, deps.cache, &resume_text, force).await?;
    steps.push(StepReport {
        step: "personal_details",
        from_cache: details_cached,
    });

    // Step 2: company summary
    let company_summary = summarize_company(
        deps.llm,
        deps.fetcher,
        deps.cache,
        &CompanyRequest {
            base: &request.company_base_link,
            company_name: request.company_name.as_deref(),
            token_budget: deps.company_token_budget,
            force,
        },
    )
    .await?;
    record(&mut steps, "company_summary", &company_summary);

    // Step 3: job description
    let job_description = fetch_job_description(
        deps.llm,
        deps.fetcher,
        deps.cache,
        &request.job_description_link,
        force,
    )
    .await?;
    record(&mut steps, "job_description", &job_description);

    // Step 4: industry
    let industry = classify_industry(
        deps.llm,
        deps.cache,
        &job_description.content,
        &company_summary.content,
        force,
    )
    .await?;
    record(&mut steps, "industry", &industry);

    // Step 5: structured resume
    let relevant_accomplishments = if request.semantic_search {
        select_relevant_accomplishments(
            deps.llm,
            &accomplishments.content,
            &job_description.content,
            deps.semantic_top_k,
        )
        .await
    } else {
        accomplishments.content.clone()
    };
    let resume = generate_resume_text(
        deps.llm,
        request.model_tier,
        &ResumeInputs {
            job_description: &job_description.content,
            company_summary: &company_summary.content,
            accomplishments: &relevant_accomplishments,
            industry: &industry.content,
            personal_details: &personal_details,
        },
    )
    .await?;
    debug!(
        "Generation {generation_id}: resume has {} bullets",
        resume.bullets().count()
    );
    steps.push(StepReport {
        step: "resume_text",
        from_cache: false,
    });

    // Step 6: render and persist
    let context = GenerationContext {
        job_description: job_description.content,
        company_summary: company_summary.content,
        industry: industry.content,
    };
    let (stored, docx) = deps.store.replace(resume, context).await?;

    info!(
        "Generation {generation_id}: done, {} of {} steps served from cache, docx {} bytes",
        steps.iter().filter(|s| s.from_cache).count(),
        steps.len(),
        docx.len()
    );

    Ok(GenerationOutcome {
        generation_id,
        stored,
        docx,
        steps,
    })
}

fn record(steps: &mut Vec<StepReport>, step: &'static str, artifact: &Artifact) {
    if artifact.from_cache {
        info!("Step {step}: reused cached artifact");
    }
    steps.push(StepReport {
        step,
        from_cache: artifact.from_cache,
    });
}

/// Text extraction is CPU-bound (zip inflate, PDF parsing), so it runs off the async executor.
async fn read_upload(field: &str, file: UploadedFile) -> Result<String, AppError> {
    let UploadedFile { file_name, bytes } = file;
    tokio::task::spawn_blocking(move || extract_upload_text(&file_name, &bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed reading upload: {e}")))?
        .map_err(|e| AppError::Validation(format!("Could not read {field}: {e:#}")))
}
