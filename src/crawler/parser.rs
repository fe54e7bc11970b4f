//! HTML content extraction
//!
//! This module pulls what the crawler stores about a page out of its body:
//! - The page title
//! - Text of emphasis tags (`strong`, `b`, `em`, `h1`, `h2`, `h3`)
//! - Outbound links, resolved to absolute URLs
//!
//! Malformed markup never fails extraction; missing parts come back empty.

use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Tags whose text is collected as emphasis
pub const EMPHASIS_TAGS: [&str; 6] = ["strong", "b", "em", "h1", "h2", "h3"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Trimmed `<title>` text, empty if absent
    pub title: String,

    /// Emphasis tag -> trimmed text of each occurrence, in document order
    pub emphasis: BTreeMap<String, Vec<String>>,

    /// Absolute http(s) URLs of outbound links, in document order
    pub links: Vec<String>,
}

/// Turns a fetched body into an `ExtractedPage`
pub trait Extractor: Send + Sync {
    fn extract(&self, page_url: &str, body: &str) -> ExtractedPage;
}

/// `scraper`-backed extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, page_url: &str, body: &str) -> ExtractedPage {
        parse_html(body, Url::parse(page_url).ok().as_ref())
    }
}

/// Parses HTML content and extracts title, emphasis and links
///
/// # Link Extraction Rules
///
/// - `<a href="...">` only
/// - Relative hrefs are joined onto `base_url`; without a base only absolute hrefs survive
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only hrefs are skipped
/// - Anything that is not http or https after resolution is skipped
///
/// # Example
///
/// ```
/// use frontier_crawler::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = parse_html(html, Some(&base_url));
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: Option<&Url>) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        emphasis: extract_emphasis(&document),
        links: extract_links(&document, base_url),
    }
}

fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_emphasis(document: &Html) -> BTreeMap<String, Vec<String>> {
    EMPHASIS_TAGS
        .iter()
        .map(|tag| {
            let texts = match Selector::parse(tag) {
                Ok(selector) => document
                    .select(&selector)
                    .map(|element| element.text().collect::<String>().trim().to_string())
                    .collect(),
                Err(_) => Vec::new(),
            };
            (tag.to_string(), texts)
        })
        .collect()
}

fn extract_links(document: &Html, base_url: Option<&Url>) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = match base_url {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };

    match resolved {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn parse(html: &str) -> ExtractedPage {
        parse_html(html, Some(&base_url()))
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let page = parse(r#"<html><head><title>  Test Page  </title></head><body></body></html>"#);
        assert_eq!(page.title, "Test Page");
    }

    #[test]
    fn test_missing_title_is_empty() {
        let page = parse(r#"<html><head></head><body></body></html>"#);
        assert_eq!(page.title, "");
    }

    #[test]
    fn test_emphasis_by_tag() {
        let page = parse(
            r#"<html><body>
                <h1> Main </h1>
                <h2>Sub one</h2><h2>Sub two</h2>
                <p><strong>bold</strong> and <em>leaning</em> and <b> b </b></p>
            </body></html>"#,
        );

        assert_eq!(page.emphasis["h1"], vec!["Main"]);
        assert_eq!(page.emphasis["h2"], vec!["Sub one", "Sub two"]);
        assert_eq!(page.emphasis["strong"], vec!["bold"]);
        assert_eq!(page.emphasis["em"], vec!["leaning"]);
        assert_eq!(page.emphasis["b"], vec!["b"]);
        assert!(page.emphasis["h3"].is_empty());
        assert_eq!(page.emphasis.len(), EMPHASIS_TAGS.len());
    }

    #[test]
    fn test_extract_relative_and_absolute_links() {
        let page = parse(
            r#"<html><body>
                <a href="/other">Root relative</a>
                <a href="sibling">Path relative</a>
                <a href="https://other.com/page">Absolute</a>
            </body></html>"#,
        );
        assert_eq!(
            page.links,
            vec![
                "https://example.com/other",
                "https://example.com/sibling",
                "https://other.com/page"
            ]
        );
    }

    #[test]
    fn test_skip_special_schemes_and_fragments() {
        let page = parse(
            r##"<html><body>
                <a href="javascript:void(0)">js</a>
                <a href="mailto:test@example.com">mail</a>
                <a href="tel:+1234567890">call</a>
                <a href="data:text/html,hi">data</a>
                <a href="#section">jump</a>
                <a href="ftp://example.com/file">ftp</a>
                <a href="">empty</a>
                <a href="/valid">valid</a>
            </body></html>"##,
        );
        assert_eq!(page.links, vec!["https://example.com/valid"]);
    }

    #[test]
    fn test_without_base_only_absolute_links_survive() {
        let page = parse_html(
            r#"<a href="/relative">r</a><a href="https://a.test/x">a</a>"#,
            None,
        );
        assert_eq!(page.links, vec!["https://a.test/x"]);
    }

    #[test]
    fn test_garbage_degrades_to_defaults() {
        let page = HtmlExtractor.extract("not a url", "\u{0}<<<>>>not html at all");
        assert_eq!(page.title, "");
        assert!(page.links.is_empty());
        assert!(page.emphasis.values().all(|texts| texts.is_empty()));
    }
}
