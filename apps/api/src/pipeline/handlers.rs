//! Axum route handler for resume generation.

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::document::DOCX_MIME;
use crate::errors::AppError;
use crate::llm_client::ModelTier;
use crate::pipeline::generator::{
    generate_resume, GenerationOutcome, GenerationRequest, StepReport, UploadedFile,
};
use crate::resume::models::StructuredResume;
use crate::state::AppState;

pub const RESUME_VERSION_HEADER: &str = "x-resume-version";
pub const GENERATION_ID_HEADER: &str = "x-generation-id";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Docx,
    Json,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub generation_id: Uuid,
    pub version: u64,
    pub resume: StructuredResume,
    pub steps: Vec<StepReport>,
    pub download_url: &'static str,
}

/// Multipart fields as received, before validation.
#[derive(Debug, Default)]
struct GenerateForm {
    resume_file: Option<UploadedFile>,
    accomplishments_file: Option<UploadedFile>,
    job_description_link: Option<String>,
    company_base_link: Option<String>,
    company_name: Option<String>,
    force_run_all: bool,
    use_advanced_model: bool,
    /// Unset means on.
    use_semantic_search: Option<bool>,
    response_format: ResponseFormat,
}

impl GenerateForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = GenerateForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "resume_file" | "accomplishments_file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched optional file input.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    let upload = UploadedFile { file_name, bytes };
                    if name == "resume_file" {
                        form.resume_file = Some(upload);
                    } else {
                        form.accomplishments_file = Some(upload);
                    }
                }
                "job_description_link" => form.job_description_link = non_empty(field.text().await?),
                "company_base_link" => form.company_base_link = non_empty(field.text().await?),
                "company_name" => form.company_name = non_empty(field.text().await?),
                "force_run_all" => form.force_run_all = parse_flag(&name, &field.text().await?)?,
                "use_advanced_model" | "use_o1_model" => {
                    form.use_advanced_model = parse_flag(&name, &field.text().await?)?
                }
                "use_semantic_search" => {
                    let value = field.text().await?;
                    if !value.trim().is_empty() {
                        form.use_semantic_search = Some(parse_flag(&name, &value)?);
                    }
                }
                "response_format" => {
                    form.response_format = parse_format(&field.text().await?)?
                }
                other => debug!("Ignoring unknown multipart field '{other}'"),
            }
        }

        Ok(form)
    }

    fn into_request(self) -> Result<(GenerationRequest, ResponseFormat), AppError> {
        let resume_file = self
            .resume_file
            .ok_or_else(|| AppError::Validation("resume_file is required".to_string()))?;
        let job_description_link = parse_link(
            "job_description_link",
            self.job_description_link.as_deref(),
        )?;
        let company_base_link =
            parse_link("company_base_link", self.company_base_link.as_deref())?;

        let request = GenerationRequest {
            resume_file,
            accomplishments_file: self.accomplishments_file,
            job_description_link,
            company_base_link,
            company_name: self.company_name,
            force_run_all: self.force_run_all,
            semantic_search: self.use_semantic_search.unwrap_or(true),
            model_tier: if self.use_advanced_model {
                ModelTier::Advanced
            } else {
                ModelTier::Standard
            },
        };
        Ok((request, self.response_format))
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_flag(field: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(AppError::Validation(format!(
            "{field} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_format(value: &str) -> Result<ResponseFormat, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "docx" => Ok(ResponseFormat::Docx),
        "json" => Ok(ResponseFormat::Json),
        other => Err(AppError::Validation(format!(
            "response_format must be 'docx' or 'json', got '{other}'"
        ))),
    }
}

fn parse_link(field: &str, value: Option<&str>) -> Result<Url, AppError> {
    let raw = value.ok_or_else(|| AppError::Validation(format!("{field} is required")))?;
    let url = Url::parse(raw)
        .map_err(|e| AppError::Validation(format!("{field} is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::Validation(format!(
            "{field} must be an http(s) URL"
        )));
    }
    Ok(url)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate_resume
///
/// Multipart upload → full pipeline → the new .docx as an attachment
/// (or JSON when `response_format=json`).
pub async fn handle_generate_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = GenerateForm::from_multipart(multipart).await?;
    let (request, format) = form.into_request()?;

    let outcome = generate_resume(&state.pipeline(), request).await?;

    Ok(match format {
        ResponseFormat::Docx => docx_response(outcome),
        ResponseFormat::Json => json_response(outcome),
    })
}

fn docx_response(outcome: GenerationOutcome) -> Response {
    (
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"resume.docx\"".to_string(),
            ),
            (
                HeaderName::from_static(RESUME_VERSION_HEADER),
                outcome.stored.version.to_string(),
            ),
            (
                HeaderName::from_static(GENERATION_ID_HEADER),
                outcome.generation_id.to_string(),
            ),
        ],
        outcome.docx,
    )
        .into_response()
}

fn json_response(outcome: GenerationOutcome) -> Response {
    Json(GenerateResponse {
        generation_id: outcome.generation_id,
        version: outcome.stored.version,
        resume: outcome.stored.resume,
        steps: outcome.steps,
        download_url: "/resume/download",
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accept_common_spellings() {
        assert!(parse_flag("force_run_all", "True").unwrap());
        assert!(parse_flag("force_run_all", "on").unwrap());
        assert!(!parse_flag("force_run_all", "").unwrap());
        assert!(matches!(
            parse_flag("force_run_all", "maybe"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_links_must_be_absolute_http() {
        assert!(parse_link("company_base_link", Some("https://acme.com")).is_ok());
        assert!(parse_link("company_base_link", Some("acme.com")).is_err());
        assert!(parse_link("company_base_link", Some("ftp://acme.com")).is_err());
        assert!(matches!(
            parse_link("company_base_link", None),
            Err(AppError::Validation(ref m)) if m.contains("required")
        ));
    }

    #[test]
    fn test_missing_resume_file_is_validation_error() {
        let form = GenerateForm {
            job_description_link: Some("https://jobs.example.com/1".to_string()),
            company_base_link: Some("https://acme.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            form.into_request(),
            Err(AppError::Validation(ref m)) if m.contains("resume_file")
        ));
    }

    #[test]
    fn test_semantic_search_defaults_to_on() {
        let form = || GenerateForm {
            resume_file: Some(UploadedFile {
                file_name: "cv.docx".to_string(),
                bytes: bytes::Bytes::from_static(b"PK"),
            }),
            job_description_link: Some("https://jobs.example.com/1".to_string()),
            company_base_link: Some("https://acme.com".to_string()),
            ..Default::default()
        };
        let (request, _) = form().into_request().unwrap();
        assert!(request.semantic_search);

        let opted_out = GenerateForm {
            use_semantic_search: Some(false),
            ..form()
        };
        let (request, _) = opted_out.into_request().unwrap();
        assert!(!request.semantic_search);
    }

    #[test]
    fn test_response_format_parsing() {
        assert_eq!(parse_format("JSON").unwrap(), ResponseFormat::Json);
        assert_eq!(parse_format("").unwrap(), ResponseFormat::Docx);
        assert!(parse_format("pdf").is_err());
    }
}
