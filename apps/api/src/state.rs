#[cfg(test)]
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::cache::ArtifactCache;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::generator::PipelineDeps;
use crate::resume::store::ResumeStore;
use crate::scrape::{HttpFetcher, PageFetcher};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// Page fetcher for job postings and company sites. Tests swap in a static one.
    pub fetcher: Arc<dyn PageFetcher>,
    pub cache: ArtifactCache,
    /// The single current resume; all edits serialize through its write lock.
    pub store: ResumeStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let llm = LlmClient::new(&config)?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);
        Ok(Self::assemble(config, llm, fetcher))
    }

    fn assemble(config: Config, llm: LlmClient, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            llm,
            fetcher,
            cache: ArtifactCache::new(config.cache_dir()),
            store: ResumeStore::new(config.result_dir()),
            config,
        }
    }

    pub fn pipeline(&self) -> PipelineDeps<'_> {
        PipelineDeps {
            llm: &self.llm,
            fetcher: self.fetcher.as_ref(),
            cache: &self.cache,
            store: &self.store,
            company_token_budget: self.config.company_token_budget,
            semantic_top_k: self.config.semantic_top_k,
        }
    }
}

#[cfg(test)]
impl AppState {
    pub fn for_tests(
        data_dir: PathBuf,
        backend: Arc<crate::llm_client::testing::ScriptedBackend>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let llm = crate::llm_client::testing::client(backend);
        Self::assemble(Config::for_tests(data_dir), llm, fetcher)
    }
}
