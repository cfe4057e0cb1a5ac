//! Axum route handlers for reading and editing the current resume.
//!
//! Every mutation is a read-modify-write through `ResumeStore::update`. LLM calls
//! happen before the store lock is taken; only the final splice runs under it.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::document::reader::docx_text;
use crate::document::DOCX_MIME;
use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM, RESUME_ASSISTANT_SYSTEM};
use crate::llm_client::{parse_json_reply, ModelTier};
use crate::pipeline::handlers::RESUME_VERSION_HEADER;
use crate::resume::edit::{self, ListAction};
use crate::resume::models::{strip_bullet_marker, ResumeSection, StructuredResume};
use crate::resume::prompts::{BULLET_EDIT_PROMPT, SECTION_EDIT_PROMPT};
use crate::resume::store::{no_resume_yet, StoredResume};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ResumeContentResponse {
    Structured {
        version: u64,
        updated_at: DateTime<Utc>,
        resume: StructuredResume,
    },
    /// Only a .docx exists (e.g. the JSON was removed by hand).
    RawText { content: String, file_size: usize },
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub resume: StructuredResume,
}

impl From<StoredResume> for EditResponse {
    fn from(stored: StoredResume) -> Self {
        Self {
            version: stored.version,
            updated_at: stored.updated_at,
            resume: stored.resume,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditSectionRequest {
    pub section: ResumeSection,
    pub instruction: String,
    #[serde(default)]
    pub use_advanced_model: bool,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EditItemFieldRequest {
    pub section: ResumeSection,
    #[serde(default)]
    pub item_index: usize,
    pub field: String,
    pub value: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EditBulletRequest {
    pub section: ResumeSection,
    pub item_index: usize,
    pub bullet_index: usize,
    pub text: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EditBulletWithAiRequest {
    pub section: ResumeSection,
    pub item_index: usize,
    pub bullet_index: usize,
    pub instruction: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ManageBulletRequest {
    pub section: ResumeSection,
    pub item_index: usize,
    pub action: ListAction,
    pub bullet_index: Option<usize>,
    pub text: Option<String>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ManageItemRequest {
    pub section: ResumeSection,
    pub action: ListAction,
    pub item_index: Option<usize>,
    pub item: Option<Value>,
    pub expected_version: Option<u64>,
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Read handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /resume/content
///
/// The stored structured resume; falls back to the raw text of the .docx.
pub async fn handle_get_content(
    State(state): State<AppState>,
) -> Result<Json<ResumeContentResponse>, AppError> {
    if let Some(stored) = state.store.load().await? {
        return Ok(Json(ResumeContentResponse::Structured {
            version: stored.version,
            updated_at: stored.updated_at,
            resume: stored.resume,
        }));
    }

    let docx = state.store.load_docx().await?.ok_or_else(no_resume_yet)?;
    let file_size = docx.len();
    let content = tokio::task::spawn_blocking(move || docx_text(&docx))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed: {e}")))??;

    Ok(Json(ResumeContentResponse::RawText { content, file_size }))
}

/// GET /resume/download
pub async fn handle_download(State(state): State<AppState>) -> Result<Response, AppError> {
    let docx = state.store.load_docx().await?.ok_or_else(no_resume_yet)?;
    let version = state
        .store
        .load()
        .await?
        .map(|stored| stored.version.to_string())
        .unwrap_or_default();

    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"tailored_resume.docx\"".to_string(),
            ),
            (HeaderName::from_static(RESUME_VERSION_HEADER), version),
        ],
        docx,
    )
        .into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Direct edits
// ────────────────────────────────────────────────────────────────────────────

/// POST /resume/edit-item-field
pub async fn handle_edit_item_field(
    State(state): State<AppState>,
    Json(request): Json<EditItemFieldRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let stored = state
        .store
        .update(request.expected_version, |resume| {
            edit::set_item_field(
                resume,
                request.section,
                request.item_index,
                &request.field,
                &request.value,
            )?;
            Ok(())
        })
        .await?;
    Ok(Json(stored.into()))
}

/// POST /resume/edit-bullet-point
pub async fn handle_edit_bullet_point(
    State(state): State<AppState>,
    Json(request): Json<EditBulletRequest>,
) -> Result<Json<EditResponse>, AppError> {
    require_text("text", &request.text)?;
    let stored = state
        .store
        .update(request.expected_version, |resume| {
            edit::set_bullet(
                resume,
                request.section,
                request.item_index,
                request.bullet_index,
                &request.text,
            )?;
            Ok(())
        })
        .await?;
    Ok(Json(stored.into()))
}

/// POST /resume/manage-bullet
pub async fn handle_manage_bullet(
    State(state): State<AppState>,
    Json(request): Json<ManageBulletRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let stored = match request.action {
        ListAction::Add => {
            let text = request.text.as_deref().unwrap_or_default();
            require_text("text", text)?;
            state
                .store
                .update(request.expected_version, |resume| {
                    edit::add_bullet(
                        resume,
                        request.section,
                        request.item_index,
                        request.bullet_index,
                        text,
                    )?;
                    Ok(())
                })
                .await?
        }
        ListAction::Remove => {
            let bullet_index = request.bullet_index.ok_or_else(|| {
                AppError::Validation("bullet_index is required to remove a bullet".to_string())
            })?;
            state
                .store
                .update(request.expected_version, |resume| {
                    edit::remove_bullet(resume, request.section, request.item_index, bullet_index)?;
                    Ok(())
                })
                .await?
        }
    };
    Ok(Json(stored.into()))
}

/// POST /resume/manage-item
pub async fn handle_manage_item(
    State(state): State<AppState>,
    Json(request): Json<ManageItemRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let stored = match request.action {
        ListAction::Add => {
            let item = request.item;
            state
                .store
                .update(request.expected_version, move |resume| {
                    edit::add_item(resume, request.section, request.item_index, item)?;
                    Ok(())
                })
                .await?
        }
        ListAction::Remove => {
            let item_index = request.item_index.ok_or_else(|| {
                AppError::Validation("item_index is required to remove an item".to_string())
            })?;
            state
                .store
                .update(request.expected_version, |resume| {
                    edit::remove_item(resume, request.section, item_index)?;
                    Ok(())
                })
                .await?
        }
    };
    Ok(Json(stored.into()))
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-assisted edits
// ────────────────────────────────────────────────────────────────────────────

/// POST /resume/edit-section
///
/// The model rewrites one section; its reply must deserialize into that section's
/// shape or it is sent back with the error for another attempt. If the section
/// changed while the model was working, the rewrite is discarded with a 409.
pub async fn handle_edit_section(
    State(state): State<AppState>,
    Json(request): Json<EditSectionRequest>,
) -> Result<Json<EditResponse>, AppError> {
    require_text("instruction", &request.instruction)?;
    let current = state.store.require().await?;
    let section = request.section;

    let original = current.resume.section_value(section);
    let current_json =
        serde_json::to_string_pretty(&original).map_err(|e| AppError::Internal(e.into()))?;
    let prompt = fill_template(
        SECTION_EDIT_PROMPT,
        &[
            ("section", section.key()),
            ("shape", section.kind().describe()),
            ("current", current_json.as_str()),
            ("instruction", request.instruction.trim()),
            ("industry", current.context.industry.as_str()),
            ("job_description", current.context.job_description.as_str()),
            ("company_summary", current.context.company_summary.as_str()),
        ],
    );

    let tier = if request.use_advanced_model {
        ModelTier::Advanced
    } else {
        ModelTier::Standard
    };
    let rewritten = state
        .llm
        .call_validated(tier, &prompt, JSON_ONLY_SYSTEM, |reply| {
            let value: Value = parse_json_reply(reply)?;
            StructuredResume::parse_section(section, value)
        })
        .await
        .map_err(|e| AppError::from_llm("Section edit", e))?;

    let stored = state
        .store
        .update(request.expected_version, move |resume| {
            if resume.section_value(section) != original {
                return Err(AppError::Conflict(format!(
                    "Section '{}' changed while it was being rewritten; retry the edit",
                    section.key()
                )));
            }
            resume.take_section_from(section, rewritten);
            Ok(())
        })
        .await?;
    info!("Section '{}' rewritten (version {})", section.key(), stored.version);
    Ok(Json(stored.into()))
}

/// POST /resume/edit-bullet-with-ai
///
/// Rewrites one bullet. If that bullet changed while the model was working, the
/// rewrite is discarded with a 409 rather than clobbering the newer text.
pub async fn handle_edit_bullet_with_ai(
    State(state): State<AppState>,
    Json(request): Json<EditBulletWithAiRequest>,
) -> Result<Json<EditResponse>, AppError> {
    require_text("instruction", &request.instruction)?;
    let current = state.store.require().await?;
    let original = edit::bullet_text(
        &current.resume,
        request.section,
        request.item_index,
        request.bullet_index,
    )?;

    let entry = current
        .resume
        .entries(request.section)
        .and_then(|entries| entries.get(request.item_index))
        .map(|entry| format!("{} - {} ({})", entry.title, entry.place, entry.date))
        .unwrap_or_default();
    let prompt = fill_template(
        BULLET_EDIT_PROMPT,
        &[
            ("bullet", original.as_str()),
            ("instruction", request.instruction.trim()),
            ("entry", entry.as_str()),
            ("industry", current.context.industry.as_str()),
            ("job_description", current.context.job_description.as_str()),
        ],
    );

    let reply = state
        .llm
        .call(&prompt, RESUME_ASSISTANT_SYSTEM)
        .await
        .map_err(|e| AppError::from_llm("Bullet edit", e))?;
    let rewritten = clean_bullet_reply(&reply).ok_or_else(|| {
        AppError::UnprocessableEntity("Bullet edit returned no usable text".to_string())
    })?;

    let stored = state
        .store
        .update(request.expected_version, |resume| {
            let now = edit::bullet_text(
                resume,
                request.section,
                request.item_index,
                request.bullet_index,
            )?;
            if now != original {
                return Err(AppError::Conflict(
                    "Bullet changed while it was being rewritten; retry the edit".to_string(),
                ));
            }
            edit::set_bullet(
                resume,
                request.section,
                request.item_index,
                request.bullet_index,
                &rewritten,
            )?;
            Ok(())
        })
        .await?;
    Ok(Json(stored.into()))
}

/// First non-empty line of the reply, without bullet glyphs or wrapping quotes.
/// Quotes are only removed as a matching pair, so a trailing possessive survives.
fn clean_bullet_reply(reply: &str) -> Option<String> {
    let line = reply.lines().map(strip_bullet_marker).find(|l| !l.is_empty())?;
    let line = unwrap_quotes(line).trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn unwrap_quotes(line: &str) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && matches!(first, '"' | '\'' | '`') => {
            &line[first.len_utf8()..line.len() - last.len_utf8()]
        }
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::ArtifactCache;
    use crate::config::Config;
    use crate::llm_client::{ChatBackend, ChatMessage, LlmClient, LlmError};
    use crate::resume::store::{GenerationContext, ResumeStore};
    use crate::scrape::testing::StaticFetcher;

    #[test]
    fn test_clean_bullet_reply() {
        assert_eq!(
            clean_bullet_reply("\n- \"Cut p99 latency by 40%\"\nExtra commentary").as_deref(),
            Some("Cut p99 latency by 40%")
        );
        assert_eq!(clean_bullet_reply("  \n \"\" "), None);
        assert_eq!(
            clean_bullet_reply("`Automated releases`").as_deref(),
            Some("Automated releases")
        );
    }

    #[test]
    fn test_clean_bullet_reply_keeps_unpaired_apostrophes() {
        assert_eq!(
            clean_bullet_reply("Cut on-call load by automating the teams'").as_deref(),
            Some("Cut on-call load by automating the teams'")
        );
        assert_eq!(
            clean_bullet_reply("'Mentored 4 engineers' code reviews").as_deref(),
            Some("'Mentored 4 engineers' code reviews")
        );
    }

    /// Commits a competing skills edit while the "model" is still thinking.
    struct RacingBackend {
        store: ResumeStore,
    }

    #[async_trait]
    impl ChatBackend for RacingBackend {
        async fn complete(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.store
                .update(None, |resume| {
                    resume.skills.push("Kafka".to_string());
                    Ok(())
                })
                .await
                .unwrap();
            Ok(r#"["Rust", "Tokio"]"#.to_string())
        }

        async fn embed(&self, _model: &str, _inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_edit_section_discards_rewrite_when_section_changed_meanwhile() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_path_buf());
        let store = ResumeStore::new(config.result_dir());
        store
            .replace(
                StructuredResume {
                    professional_summary: "Backend engineer.".to_string(),
                    skills: vec!["Rust".to_string()],
                    ..Default::default()
                },
                GenerationContext::default(),
            )
            .await
            .unwrap();

        let backend = Arc::new(RacingBackend {
            store: store.clone(),
        });
        let state = AppState {
            llm: LlmClient::with_backend(backend, "test-model", "test-advanced-model"),
            fetcher: StaticFetcher::new(),
            cache: ArtifactCache::new(config.cache_dir()),
            store: store.clone(),
            config,
        };
        let request = EditSectionRequest {
            section: ResumeSection::Skills,
            instruction: "Add async runtimes".to_string(),
            use_advanced_model: false,
            expected_version: None,
        };

        let result = handle_edit_section(State(state), Json(request)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let stored = store.require().await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.resume.skills, vec!["Rust", "Kafka"]);
    }

    #[test]
    fn test_manage_item_request_accepts_snake_case_actions() {
        let request: ManageItemRequest = serde_json::from_value(serde_json::json!({
            "section": "work_experience",
            "action": "remove",
            "item_index": 1
        }))
        .unwrap();
        assert_eq!(request.section, ResumeSection::WorkExperience);
        assert_eq!(request.action, ListAction::Remove);
        assert_eq!(request.expected_version, None);
    }
}
