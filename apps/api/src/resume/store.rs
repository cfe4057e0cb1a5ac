//! The persisted "current resume": one JSON document plus its rendered .docx.
//!
//! All writes go through a single async mutex, so read-modify-write cycles are
//! serialized and concurrent edits to different sections cannot clobber each other.
//! Callers may pass `expected_version` to turn a stale edit into a 409.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::document::writer::render_resume;
use crate::errors::AppError;
use crate::fs_ops::{read_optional, write_atomic};
use crate::resume::models::StructuredResume;

const RESUME_JSON: &str = "resume.json";
const RESUME_DOCX: &str = "resume.docx";

/// Artifacts the resume was generated from; fed to LLM-assisted edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub company_summary: String,
    #[serde(default)]
    pub industry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResume {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub resume: StructuredResume,
    #[serde(default)]
    pub context: GenerationContext,
}

#[derive(Clone)]
pub struct ResumeStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ResumeStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(RESUME_JSON)
    }

    pub fn docx_path(&self) -> PathBuf {
        self.dir.join(RESUME_DOCX)
    }

    /// The last committed structured resume, if one has been generated.
    pub async fn load(&self) -> Result<Option<StoredResume>, AppError> {
        let Some(bytes) = read_optional(&self.json_path()).await? else {
            return Ok(None);
        };
        let stored: StoredResume = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt resume document at {}", self.json_path().display()))?;
        Ok(Some(stored))
    }

    /// Like `load`, but a missing document is a 404.
    pub async fn require(&self) -> Result<StoredResume, AppError> {
        self.load().await?.ok_or_else(no_resume_yet)
    }

    pub async fn load_docx(&self) -> Result<Option<Vec<u8>>, AppError> {
        Ok(read_optional(&self.docx_path()).await?)
    }

    /// Replaces the current resume with a freshly generated one (version 1).
    /// Returns the stored document and its rendered .docx bytes.
    pub async fn replace(
        &self,
        resume: StructuredResume,
        context: GenerationContext,
    ) -> Result<(StoredResume, Vec<u8>), AppError> {
        let _guard = self.write_lock.lock().await;
        let stored = StoredResume {
            version: 1,
            updated_at: Utc::now(),
            resume,
            context,
        };
        let docx = self.commit(&stored).await?;
        info!("Stored new resume at {}", self.json_path().display());
        Ok((stored, docx))
    }

    /// Read-modify-write under the store lock. `mutate` sees the latest committed
    /// document; on success the version is bumped and both files are rewritten.
    pub async fn update<F>(
        &self,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<StoredResume, AppError>
    where
        F: FnOnce(&mut StructuredResume) -> Result<(), AppError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.require().await?;

        if let Some(expected) = expected_version {
            if expected != stored.version {
                return Err(AppError::Conflict(format!(
                    "Resume is at version {}, edit was based on version {expected}",
                    stored.version
                )));
            }
        }

        mutate(&mut stored.resume)?;
        stored.version += 1;
        stored.updated_at = Utc::now();
        self.commit(&stored).await?;
        info!("Resume updated to version {}", stored.version);
        Ok(stored)
    }

    /// Renders and writes both files. Caller must hold the write lock.
    async fn commit(&self, stored: &StoredResume) -> Result<Vec<u8>, AppError> {
        let docx = render_resume(&stored.resume)?;
        let json = serde_json::to_vec_pretty(stored).context("Failed to serialize resume")?;
        write_atomic(self.json_path(), json).await?;
        write_atomic(self.docx_path(), docx.clone()).await?;
        Ok(docx)
    }
}

pub fn no_resume_yet() -> AppError {
    AppError::NotFound("No resume found. Please generate a resume first.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::edit;
    use crate::resume::models::{ResumeEntry, ResumeSection};

    fn sample() -> StructuredResume {
        StructuredResume {
            professional_summary: "Platform engineer.".to_string(),
            work_experience: vec![ResumeEntry {
                title: "Engineer".to_string(),
                place: "Acme".to_string(),
                date: "2020 - 2024".to_string(),
                description: vec!["Shipped billing".to_string()],
            }],
            skills: vec!["Rust".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_before_generation_is_none_and_require_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path().to_path_buf());
        assert!(store.load().await.unwrap().is_none());
        assert!(matches!(store.require().await, Err(AppError::NotFound(_))));
        assert!(store.load_docx().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_then_update_bumps_version_and_rewrites_docx() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path().to_path_buf());
        let (stored, docx) = store
            .replace(sample(), GenerationContext::default())
            .await
            .unwrap();
        assert_eq!(stored.version, 1);
        assert!(!docx.is_empty());

        let updated = store
            .update(Some(1), |resume| {
                edit::set_bullet(resume, ResumeSection::WorkExperience, 0, 0, "Shipped invoicing")?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 2);

        let reloaded = store.require().await.unwrap();
        assert_eq!(reloaded, updated);
        let text = crate::document::reader::docx_text(&store.load_docx().await.unwrap().unwrap())
            .unwrap();
        assert!(text.contains("Shipped invoicing"));
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path().to_path_buf());
        store
            .replace(sample(), GenerationContext::default())
            .await
            .unwrap();

        let result = store.update(Some(7), |_| Ok(())).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.require().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path().to_path_buf());
        store
            .replace(sample(), GenerationContext::default())
            .await
            .unwrap();

        let result = store
            .update(None, |resume| {
                edit::remove_item(resume, ResumeSection::Education, 0)?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let reloaded = store.require().await.unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(reloaded.resume, sample());
    }

    #[tokio::test]
    async fn test_concurrent_edits_to_different_sections_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path().to_path_buf());
        store
            .replace(sample(), GenerationContext::default())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(None, move |resume| {
                        if i % 2 == 0 {
                            edit::add_item(
                                resume,
                                ResumeSection::Skills,
                                None,
                                Some(serde_json::json!(format!("skill-{i}"))),
                            )?;
                        } else {
                            edit::add_bullet(
                                resume,
                                ResumeSection::WorkExperience,
                                0,
                                None,
                                &format!("bullet-{i}"),
                            )?;
                        }
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.require().await.unwrap();
        assert_eq!(stored.version, 9);
        assert_eq!(stored.resume.skills.len(), 1 + 4);
        assert_eq!(stored.resume.work_experience[0].description.len(), 1 + 4);
    }
}
