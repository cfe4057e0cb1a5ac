//! Same-domain breadth-first crawl used to gather company text.

use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::Duration;

use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::{debug, info, warn};
use url::Url;

use super::html::parse_page;
use super::{PageFetcher, ScrapeError};

/// Rough chars-per-token ratio, used only if the tokenizer fails to load.
const CHARS_PER_TOKEN: usize = 4;

static TOKENIZER: OnceLock<Option<CoreBPE>> = OnceLock::new();

/// The GPT-4 family encoding, loaded once.
fn tokenizer() -> Option<&'static CoreBPE> {
    TOKENIZER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!("Tokenizer unavailable, estimating tokens from length: {e}");
                None
            }
        })
        .as_ref()
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_depth: usize,
    pub max_pages: usize,
    pub token_budget: usize,
    pub delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_pages: 25,
            token_budget: 5000,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub text: String,
    pub pages: Vec<Url>,
}

pub fn count_tokens(text: &str) -> usize {
    match tokenizer() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => text.chars().count().div_ceil(CHARS_PER_TOKEN),
    }
}

/// Cuts `text` to at most `max_tokens` tokens, on a char boundary.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let Some(bpe) = tokenizer() else {
        return truncate_to_chars(text, max_tokens.saturating_mul(CHARS_PER_TOKEN));
    };
    let tokens = bpe.encode_ordinary(text);
    if tokens.len() <= max_tokens {
        return text;
    }
    // A token prefix can end inside a multi-byte char; back off until it decodes.
    for keep in (1..=max_tokens).rev() {
        if let Ok(prefix) = bpe.decode(tokens[..keep].to_vec()) {
            if text.starts_with(&prefix) {
                return &text[..prefix.len()];
            }
        }
    }
    ""
}

fn truncate_to_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Crawls `base` and same-host links up to `max_depth`, stopping once the collected
/// text exceeds the token budget. A failing base page is an error; failing
/// sub-pages are logged and skipped.
pub async fn crawl_site(
    fetcher: &dyn PageFetcher,
    base: &Url,
    options: &CrawlOptions,
) -> Result<CrawlResult, ScrapeError> {
    let host = base.host_str().map(str::to_ascii_lowercase);
    let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(base.clone(), 0)]);
    let mut seen: HashSet<Url> = HashSet::from([base.clone()]);
    let mut sections: Vec<String> = Vec::new();
    let mut pages: Vec<Url> = Vec::new();
    let mut tokens = 0usize;

    while let Some((url, depth)) = queue.pop_front() {
        if pages.len() >= options.max_pages || tokens > options.token_budget {
            break;
        }
        if !pages.is_empty() && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }

        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) if depth == 0 => return Err(e),
            Err(e) => {
                warn!("Skipping {url}: {e}");
                continue;
            }
        };

        let page = parse_page(&html, &url);
        debug!("Crawled {} ({} chars, {} links)", url, page.text.len(), page.links.len());

        if depth < options.max_depth {
            for link in page.links {
                let same_host = link.host_str().map(str::to_ascii_lowercase) == host;
                if same_host && seen.insert(link.clone()) {
                    queue.push_back((link, depth + 1));
                }
            }
        }

        if !page.text.is_empty() {
            let section = format!("{url}:\n{}", page.text);
            tokens += count_tokens(&section);
            sections.push(section);
        }
        pages.push(url);
    }

    let joined = sections.join("\n\n");
    let text = truncate_to_tokens(&joined, options.token_budget).trim().to_string();
    if text.is_empty() {
        return Err(ScrapeError::Empty {
            url: base.to_string(),
        });
    }

    info!(
        "Crawled {} pages from {} (~{} tokens)",
        pages.len(),
        base,
        count_tokens(&text)
    );
    Ok(CrawlResult { text, pages })
}
