//! Web search over DuckDuckGo's HTML results page.
//!
//! Search never fails from the caller's point of view: any error, or an
//! empty result page, yields a fixed list of provider links instead.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::extract::{main_content_text, page_text, truncate_chars};
use crate::fetch::{validate_url, Fetcher};

/// Snippets are only replaced by page content longer than this.
const MIN_ENRICHED_CHARS: usize = 100;

/// Length of a snippet taken from page content.
const ENRICHED_SNIPPET_CHARS: usize = 500;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Extracted text of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub content: String,
    pub url: String,
}

/// Web search and page fetching.
#[derive(Debug, Clone)]
pub struct WebSearch {
    fetcher: Fetcher,
    config: SearchConfig,
}

impl WebSearch {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { fetcher, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search the web for `query`.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        info!("Performing search for: {}", query);

        let results = match self.search_results(query).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                debug!("No search results for {}, using fallback", query);
                fallback_results(query)
            }
            Err(e) => {
                warn!("Search for {} failed, using fallback: {}", query, e);
                fallback_results(query)
            }
        };

        info!("Search results provided: {}", results.len());
        results
    }

    /// Fetch a page and return its visible text.
    pub async fn fetch_page(&self, url: &str) -> Result<PageContent> {
        if url.trim().is_empty() {
            return Err(SearchError::MissingField("url"));
        }

        let html = self.fetcher.fetch(url).await?;
        let text = page_text(&html);
        let content = truncate_chars(&text, self.config.max_content_chars).to_string();

        if content.chars().count() < self.config.min_content_chars {
            return Err(SearchError::NoMeaningfulContent);
        }

        info!("Web content extracted from {}, length: {}", url, content.len());
        Ok(PageContent {
            content,
            url: url.to_string(),
        })
    }

    async fn search_results(&self, query: &str) -> Result<Vec<SearchResult>> {
        let search_url = format!(
            "{}?q={}",
            self.config.search_url,
            urlencoding::encode(query)
        );
        let html = self.fetcher.fetch_configured(&search_url).await?;
        let mut results = parse_results(&html, self.config.max_results);

        if self.config.enrich_snippets {
            for result in &mut results {
                self.enrich(result).await;
            }
        }

        Ok(results)
    }

    /// Replace the snippet with the start of the page's own content.
    async fn enrich(&self, result: &mut SearchResult) {
        match self.fetcher.fetch(&result.url).await {
            Ok(html) => {
                let content = main_content_text(&html);
                if content.chars().count() > MIN_ENRICHED_CHARS {
                    result.snippet =
                        format!("{}...", truncate_chars(&content, ENRICHED_SNIPPET_CHARS));
                }
            }
            Err(e) => debug!("Could not fetch content for {}: {}", result.url, e),
        }
    }
}

/// Parse a DuckDuckGo HTML results page.
///
/// Result links point at a redirect whose `uddg` parameter carries the real
/// target; entries without one are skipped.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    document
        .select(&result_sel)
        .take(limit)
        .filter_map(|element| {
            let link = element.select(&link_sel).next()?;
            let url = decode_redirect(link.value().attr("href")?)?;

            let title = link.text().collect::<String>().trim().to_string();
            let snippet = element
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            Some(SearchResult {
                title: non_empty_or(title, "No title"),
                snippet: non_empty_or(snippet, "No description"),
                url,
            })
        })
        .collect()
}

fn decode_redirect(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com").ok()?;
    let url = base.join(href).ok()?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())?;
    validate_url(&target).ok()?;
    Some(target)
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Provider links returned when the search itself yields nothing.
pub fn fallback_results(query: &str) -> Vec<SearchResult> {
    let encoded = urlencoding::encode(query);
    let wiki_title = query.split_whitespace().collect::<Vec<_>>().join("_");

    vec![
        SearchResult {
            title: format!("{} - Wikipedia Indonesia", query),
            snippet: format!(
                "Artikel lengkap tentang {} dengan informasi mendalam dari berbagai sumber terpercaya.",
                query
            ),
            url: format!(
                "https://id.wikipedia.org/wiki/{}",
                urlencoding::encode(&wiki_title)
            ),
        },
        SearchResult {
            title: format!("{} - Google Search", query),
            snippet: format!(
                "Hasil pencarian terkini untuk {} dari berbagai sumber di internet.",
                query
            ),
            url: format!("https://www.google.com/search?q={}", encoded),
        },
        SearchResult {
            title: format!("{} - DuckDuckGo", query),
            snippet: format!(
                "Informasi tentang {} tersedia di berbagai sumber online.",
                query
            ),
            url: format!("https://duckduckgo.com/?q={}", encoded),
        },
        SearchResult {
            title: format!("{} - Bing Search", query),
            snippet: format!(
                "Temukan informasi terbaru tentang {} dari mesin pencari Bing.",
                query
            ),
            url: format!("https://www.bing.com/search?q={}", encoded),
        },
    ]
}
