// Resume generation pipeline: six sequential steps from uploads to a rendered .docx.
// All LLM calls go through llm_client, all page fetches through scrape::PageFetcher.

pub mod accomplishments;
pub mod company;
pub mod generator;
pub mod handlers;
pub mod industry;
pub mod job_description;
pub mod prompts;
pub mod resume_text;
pub mod retrieval;
