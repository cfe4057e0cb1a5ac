use scraper::{Html, Node, Selector};
use url::Url;

/// Elements whose whole subtree is never visible text.
const HIDDEN_SUBTREES: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];

/// Text sitting directly under these is boilerplate (site banners, stray markup).
const SKIPPED_PARENTS: &[&str] = &["header", "html", "input", "meta"];

/// A fetched page reduced to what the pipeline needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub text: String,
    pub links: Vec<Url>,
}

/// Parses once and returns both the readable text and the absolute http(s) links.
pub fn parse_page(html: &str, base: &Url) -> PageContent {
    let document = Html::parse_document(html);
    PageContent {
        text: text_of(&document),
        links: links_of(&document, base),
    }
}

/// Space-joined visible text of an HTML document.
pub fn visible_text(html: &str) -> String {
    text_of(&Html::parse_document(html))
}

fn text_of(document: &Html) -> String {
    let mut parts = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let parent = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()));
        if parent.is_some_and(|name| SKIPPED_PARENTS.contains(&name)) {
            continue;
        }

        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_SUBTREES.contains(&e.name()))
        });
        if hidden {
            continue;
        }

        parts.push(trimmed);
    }

    parts.join(" ")
}

fn links_of(document: &Html, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<Url> = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
  <head><title>Acme Careers</title><style>body { color: red }</style></head>
  <body>
    <header>Acme Inc</header>
    <script>var tracking = 1;</script>
    <noscript>Enable JavaScript</noscript>
    <h1>Senior Rust Engineer</h1>
    <p>Build <b>payment</b> systems.</p>
    <a href="/about">About</a>
    <a href="team#leads">Team</a>
    <a href="/about#history">History</a>
    <a href="mailto:jobs@acme.com">Mail</a>
    <a href="https://other.example.org/">Partner</a>
  </body>
</html>"##;

    #[test]
    fn test_visible_text_skips_hidden_and_boilerplate() {
        let text = visible_text(PAGE);
        assert_eq!(
            text,
            "Senior Rust Engineer Build payment systems. About Team History Mail Partner"
        );
    }

    #[test]
    fn test_links_are_absolute_deduplicated_and_http_only() {
        let base = Url::parse("https://acme.com/careers/").unwrap();
        let page = parse_page(PAGE, &base);
        let links: Vec<String> = page.links.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            links,
            vec![
                "https://acme.com/about",
                "https://acme.com/careers/team",
                "https://other.example.org/",
            ]
        );
    }
}
