//! Web search configuration.

use std::time::Duration;

/// CORS-proxy used as the second fetch strategy.
pub const DEFAULT_PROXY_URL: &str = "https://api.allorigins.win/get?url=";

/// DuckDuckGo's HTML-only results page.
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Configuration for [`crate::WebSearch`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Proxy prefix; the target URL is percent-encoded and appended.
    pub proxy_url: Option<String>,
    /// Results page queried with `?q=`.
    pub search_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Number of search results returned.
    pub max_results: usize,
    /// Upper bound of extracted page text, in characters.
    pub max_content_chars: usize,
    /// Pages with less text than this are rejected.
    pub min_content_chars: usize,
    /// Fetch each result page to replace its snippet with real content.
    pub enrich_snippets: bool,
    /// Permit targets on loopback, private and link-local addresses.
    pub allow_private: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            proxy_url: Some(DEFAULT_PROXY_URL.to_string()),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (compatible; AssistantBackend/1.0)".to_string(),
            max_results: 4,
            max_content_chars: 8000,
            min_content_chars: 50,
            enrich_snippets: true,
            allow_private: false,
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

/// Builder for [`SearchConfig`].
#[derive(Debug, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn search_url(mut self, url: impl Into<String>) -> Self {
        self.config.search_url = url.into();
        self
    }

    /// `None` disables the proxy strategy.
    pub fn proxy_url(mut self, url: Option<String>) -> Self {
        self.config.proxy_url = url;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.config.max_results = max_results;
        self
    }

    pub fn enrich_snippets(mut self, enrich: bool) -> Self {
        self.config.enrich_snippets = enrich;
        self
    }

    pub fn allow_private(mut self, allow: bool) -> Self {
        self.config.allow_private = allow;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}
