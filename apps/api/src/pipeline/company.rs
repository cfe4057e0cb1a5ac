//! Step 2: company summary from a same-domain crawl of the company site.

use tracing::info;
use url::Url;

use crate::cache::{Artifact, ArtifactCache, ArtifactKind, CacheKey};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, RESUME_ASSISTANT_SYSTEM};
use crate::llm_client::LlmClient;
use crate::pipeline::prompts::{COMPANY_NAME_PROMPT, COMPANY_SUMMARY_PROMPT};
use crate::scrape::crawl::{crawl_site, CrawlOptions};
use crate::scrape::PageFetcher;

/// Normalized company identity: the given name lowercased and trimmed, else the URL host.
pub fn company_key(company_name: Option<&str>, base: &Url) -> String {
    match company_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_lowercase(),
        None => base.host_str().unwrap_or_default().to_ascii_lowercase(),
    }
}

pub struct CompanyRequest<'a> {
    pub base: &'a Url,
    pub company_name: Option<&'a str>,
    pub token_budget: usize,
    pub force: bool,
}

/// Summary for the company behind `request.base`, keyed by `company_key`.
/// The crawled text is cached separately, keyed by URL.
pub async fn summarize_company(
    llm: &LlmClient,
    fetcher: &dyn PageFetcher,
    cache: &ArtifactCache,
    request: &CompanyRequest<'_>,
) -> Result<Artifact, AppError> {
    let key = company_key(request.company_name, request.base);
    let summary_key = CacheKey::new(ArtifactKind::CompanySummary, &[&key]);

    cache
        .get_or_compute(&summary_key, request.force, move || async move {
            let company_text = company_text(fetcher, cache, request).await?;

            let name = match request.company_name.map(str::trim).filter(|n| !n.is_empty()) {
                Some(name) => name.to_string(),
                None => {
                    let prompt = fill_template(
                        COMPANY_NAME_PROMPT,
                        &[("company_text", company_text.as_str())],
                    );
                    let name = llm
                        .call(&prompt, RESUME_ASSISTANT_SYSTEM)
                        .await
                        .map_err(|e| AppError::from_llm("Company name extraction", e))?;
                    info!("Company name identified as '{name}'");
                    name
                }
            };

            let prompt = fill_template(
                COMPANY_SUMMARY_PROMPT,
                &[
                    ("company_name", name.as_str()),
                    ("company_text", company_text.as_str()),
                ],
            );
            let summary = llm
                .call(&prompt, RESUME_ASSISTANT_SYSTEM)
                .await
                .map_err(|e| AppError::from_llm("Company summary", e))?;
            info!("Summarized company '{name}' ({} chars)", summary.len());
            Ok(summary)
        })
        .await
}

async fn company_text(
    fetcher: &dyn PageFetcher,
    cache: &ArtifactCache,
    request: &CompanyRequest<'_>,
) -> Result<String, AppError> {
    let key = CacheKey::new(ArtifactKind::CompanyData, &[request.base.as_str()]);
    let options = CrawlOptions {
        token_budget: request.token_budget,
        ..Default::default()
    };

    let artifact = cache
        .get_or_compute(&key, request.force, move || async move {
            let result = crawl_site(fetcher, request.base, &options).await?;
            info!("Crawled {} pages from {}", result.pages.len(), request.base);
            Ok(result.text)
        })
        .await?;
    Ok(artifact.content)
}
