//! Search and page fetching against a mock HTTP server.

use std::time::Duration;

use web_search::{SearchConfig, SearchError, WebSearch};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"
    <html><body>
      <nav>Menu Home About</nav>
      <article>
        <p>Ownership is Rust's most unique feature and has deep implications for the rest
        of the language. It enables Rust to make memory safety guarantees without needing
        a garbage collector.</p>
      </article>
      <footer>Footer text</footer>
    </body></html>
"#;

fn config(server: &MockServer) -> SearchConfig {
    SearchConfig::builder()
        .search_url(format!("{}/html/", server.uri()))
        .proxy_url(Some(format!("{}/proxy?url=", server.uri())))
        .timeout(Duration::from_secs(2))
        .allow_private(true)
        .build()
}

#[tokio::test]
async fn test_fetch_page_direct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ownership"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let url = format!("{}/ownership", server.uri());
    let page = search.fetch_page(&url).await.unwrap();

    assert_eq!(page.url, url);
    assert!(page.content.starts_with("Ownership is Rust's most unique feature"));
    assert!(!page.content.contains("Menu"));
    assert!(!page.content.contains("Footer"));
    assert!(!page.content.contains("  "));
}

#[tokio::test]
async fn test_fetch_page_falls_back_to_proxy() {
    let server = MockServer::start().await;
    let target = format!("{}/blocked", server.uri());

    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .and(query_param("url", target.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": ARTICLE })),
        )
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let page = search.fetch_page(&target).await.unwrap();
    assert!(page.content.contains("garbage collector"));
}

#[tokio::test]
async fn test_fetch_page_rejects_thin_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/thin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Too short.</p>"))
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let result = search
        .fetch_page(&format!("{}/thin", server.uri()))
        .await;
    assert!(matches!(result, Err(SearchError::NoMeaningfulContent)));
}

#[tokio::test]
async fn test_fetch_page_caps_content() {
    let server = MockServer::start().await;
    let long_page = format!("<p>{}</p>", "word ".repeat(5000));
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_page))
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let page = search
        .fetch_page(&format!("{}/long", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.content.chars().count(), 8000);
}

#[tokio::test]
async fn test_fetch_page_all_strategies_fail() {
    let server = MockServer::start().await;

    let search = WebSearch::new(config(&server)).unwrap();
    let result = search
        .fetch_page(&format!("{}/missing", server.uri()))
        .await;
    assert!(matches!(result, Err(SearchError::AllStrategiesFailed(ref f)) if f.len() == 2));
}

#[tokio::test]
async fn test_search_enriches_snippets() {
    let server = MockServer::start().await;
    let target = format!("{}/ownership", server.uri());
    let results_page = format!(
        r#"<html><body>
            <div class="result">
              <a class="result__a" href="/l/?uddg={}">Understanding Ownership</a>
              <a class="result__snippet">Short snippet.</a>
            </div>
        </body></html>"#,
        urlencoding::encode(&target)
    );

    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "rust ownership"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ownership"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let results = search.search("rust ownership").await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Understanding Ownership");
    assert_eq!(results[0].url, target);
    assert!(results[0].snippet.starts_with("Ownership is Rust's"));
    assert!(results[0].snippet.ends_with("..."));
}

#[tokio::test]
async fn test_search_failure_returns_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let search = WebSearch::new(config(&server)).unwrap();
    let results = search.search("kopi").await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].title, "kopi - Wikipedia Indonesia");
    assert_eq!(results[2].url, "https://duckduckgo.com/?q=kopi");
}

#[tokio::test]
async fn test_fetch_page_refuses_loopback_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<p>SECRET_INTERNAL_CREDENTIALS aws_secret_access_key=abcdefghijklmnopqrstuvwxyz0123456789</p>",
        ))
        .expect(0)
        .mount(&server)
        .await;

    let config = SearchConfig::builder()
        .proxy_url(None)
        .timeout(Duration::from_secs(2))
        .build();
    let search = WebSearch::new(config).unwrap();
    let result = search
        .fetch_page(&format!("{}/latest/meta-data/iam", server.uri()))
        .await;

    assert!(matches!(result, Err(SearchError::PrivateAddress(_))));
}

#[tokio::test]
async fn test_search_skips_enrichment_of_private_targets() {
    let server = MockServer::start().await;
    let results_page = r#"<html><body>
        <div class="result">
          <a class="result__a" href="/l/?uddg=http%3A%2F%2F10.0.0.5%2Fadmin">Internal</a>
          <a class="result__snippet">Original snippet.</a>
        </div>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page))
        .mount(&server)
        .await;

    let config = SearchConfig::builder()
        .search_url(format!("{}/html/", server.uri()))
        .proxy_url(None)
        .timeout(Duration::from_secs(2))
        .build();
    let search = WebSearch::new(config).unwrap();
    let results = search.search("internal").await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "http://10.0.0.5/admin");
    assert_eq!(results[0].snippet, "Original snippet.");
}
