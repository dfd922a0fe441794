//! Best-effort web search and page text extraction.
//!
//! Pages are fetched directly first and through a CORS proxy second.
//! Search results come from DuckDuckGo's HTML page and degrade to a fixed
//! set of provider links when anything goes wrong.
//!
//! # Example
//!
//! ```no_run
//! use web_search::{SearchConfig, WebSearch};
//!
//! # async fn example() -> web_search::Result<()> {
//! let search = WebSearch::new(SearchConfig::default())?;
//!
//! for result in search.search("rust async streams").await {
//!     println!("{} - {}", result.title, result.url);
//! }
//!
//! let page = search.fetch_page("https://www.rust-lang.org/").await?;
//! println!("{}", page.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod search;

pub use config::{SearchConfig, SearchConfigBuilder, DEFAULT_PROXY_URL, DEFAULT_SEARCH_URL};
pub use error::{Result, SearchError};
pub use fetch::{FetchStrategy, Fetcher};
pub use search::{fallback_results, parse_results, PageContent, SearchResult, WebSearch};
