//! Page fetching through an ordered list of strategies.
//!
//! Each strategy either returns a non-empty HTML body or an error; the
//! first success wins and the failures of earlier strategies are only
//! reported when all of them fail.
//!
//! Targets that resolve to loopback, private or link-local addresses are
//! refused before any strategy runs, unless the configuration allows them.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use reqwest::redirect;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// One way of retrieving a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain GET of the target URL.
    Direct,
    /// GET through a CORS proxy that wraps the page in `{"contents": ...}`.
    Proxy { prefix: String },
}

impl FetchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::Direct => "direct",
            FetchStrategy::Proxy { .. } => "proxy",
        }
    }

    fn request_url(&self, target: &str) -> String {
        match self {
            FetchStrategy::Direct => target.to_string(),
            FetchStrategy::Proxy { prefix } => {
                format!("{}{}", prefix, urlencoding::encode(target))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyEnvelope {
    #[serde(default)]
    contents: Option<String>,
}

/// HTTP fetcher that walks its strategies in order.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: Client,
    strategies: Vec<FetchStrategy>,
    allow_private: bool,
}

impl Fetcher {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let allow_private = config.allow_private;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if !allow_private && is_private_host(attempt.url()) {
                    let message = format!("redirect to private address {}", attempt.url());
                    attempt.error(message)
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .map_err(|e| SearchError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let mut strategies = vec![FetchStrategy::Direct];
        if let Some(prefix) = &config.proxy_url {
            strategies.push(FetchStrategy::Proxy {
                prefix: prefix.clone(),
            });
        }

        Ok(Self {
            http,
            strategies,
            allow_private,
        })
    }

    pub fn strategies(&self) -> &[FetchStrategy] {
        &self.strategies
    }

    /// Fetch the HTML of `target`.
    pub async fn fetch(&self, target: &str) -> Result<String> {
        self.fetch_checked(target, !self.allow_private).await
    }

    /// Fetch an operator-configured URL, such as the search endpoint.
    pub(crate) async fn fetch_configured(&self, target: &str) -> Result<String> {
        self.fetch_checked(target, false).await
    }

    async fn fetch_checked(&self, target: &str, refuse_private: bool) -> Result<String> {
        let url = validate_url(target)?;

        let mut failures = Vec::new();
        let mut direct_allowed = true;
        if refuse_private {
            match ensure_public(&url).await {
                Ok(()) => {}
                Err(e @ SearchError::PrivateAddress(_)) => {
                    warn!("Refusing to fetch {}: {}", target, e);
                    return Err(e);
                }
                // The proxy resolves the host on its own side.
                Err(e) => {
                    failures.push((FetchStrategy::Direct.name(), e));
                    direct_allowed = false;
                }
            }
        }

        for strategy in &self.strategies {
            if *strategy == FetchStrategy::Direct && !direct_allowed {
                continue;
            }
            match self.fetch_with(strategy, target).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    debug!("Fetch of {} via {} failed: {}", target, strategy.name(), e);
                    failures.push((strategy.name(), e));
                }
            }
        }

        // A single failure is reported as-is so its kind survives.
        if failures.len() == 1 {
            if let Some((_, e)) = failures.pop() {
                return Err(e);
            }
        }
        Err(SearchError::AllStrategiesFailed(
            failures
                .into_iter()
                .map(|(name, e)| format!("{}: {}", name, e))
                .collect(),
        ))
    }

    async fn fetch_with(&self, strategy: &FetchStrategy, target: &str) -> Result<String> {
        let response = self
            .http
            .get(strategy.request_url(target))
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = match strategy {
            FetchStrategy::Direct => response.text().await.map_err(SearchError::from_reqwest)?,
            FetchStrategy::Proxy { .. } => response
                .json::<ProxyEnvelope>()
                .await
                .map_err(SearchError::from_reqwest)?
                .contents
                .unwrap_or_default(),
        };

        if body.trim().is_empty() {
            return Err(SearchError::EmptyBody);
        }
        Ok(body)
    }
}

const MAX_REDIRECTS: usize = 10;

/// Only absolute http(s) URLs with a host are fetched.
pub fn validate_url(target: &str) -> Result<Url> {
    let url = Url::parse(target).map_err(|e| SearchError::InvalidUrl(format!("{}: {}", target, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(SearchError::InvalidUrl(format!(
                "unsupported scheme {}",
                other
            )))
        }
    }
    if url.host().is_none() {
        return Err(SearchError::InvalidUrl(format!("{}: URL must have a host", target)));
    }
    Ok(url)
}

/// Resolve the host of `url` and reject it if any address is internal.
pub async fn ensure_public(url: &Url) -> Result<()> {
    if is_private_host(url) {
        return Err(SearchError::PrivateAddress(url.to_string()));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        // IP literals were checked above.
        _ => return Ok(()),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    let addr = format!("{}:{}", host, port);
    let addrs = tokio::task::spawn_blocking(move || {
        addr.to_socket_addrs().map(|iter| iter.collect::<Vec<_>>())
    })
    .await
    .map_err(|e| SearchError::Network(format!("DNS resolution task failed: {}", e)))?
    .map_err(|e| SearchError::Network(format!("Failed to resolve {}: {}", host, e)))?;

    if let Some(addr) = addrs.iter().find(|addr| is_private_ip(&addr.ip())) {
        return Err(SearchError::PrivateAddress(format!("{} ({})", host, addr.ip())));
    }
    Ok(())
}

/// Checks the host as written, without resolving names.
fn is_private_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_private_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(&IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        None => true,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                // 169.254.0.0/16, cloud metadata services live here
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                || ipv4.is_unspecified()
                // 100.64.0.0/10 shared address space
                || (ipv4.octets()[0] == 100 && (ipv4.octets()[1] & 0xC0) == 64)
                || *ipv4 == Ipv4Addr::new(169, 254, 169, 254)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6
                    .to_ipv4_mapped()
                    .map(|v4| is_private_ip(&IpAddr::V4(v4)))
                    .unwrap_or(false)
                // fc00::/7 unique local
                || (ipv6.segments()[0] & 0xFE00) == 0xFC00
                // fe80::/10 link-local
                || (ipv6.segments()[0] & 0xFFC0) == 0xFE80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url_encodes_target() {
        let strategy = FetchStrategy::Proxy {
            prefix: "https://proxy.test/get?url=".to_string(),
        };
        assert_eq!(
            strategy.request_url("https://example.com/a?b=c"),
            "https://proxy.test/get?url=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc"
        );
        assert_eq!(
            FetchStrategy::Direct.request_url("https://example.com/"),
            "https://example.com/"
        );
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/page").is_ok());
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(SearchError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(SearchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_is_private_ip() {
        let private = [
            "127.0.0.1",
            "10.0.0.8",
            "172.16.4.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
            "::ffff:169.254.169.254",
        ];
        for ip in private {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(is_private_ip(&ip), "{} should be private", ip);
        }

        for ip in ["93.184.216.34", "1.1.1.1", "2606:4700:4700::1111", "100.128.0.1"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(!is_private_ip(&ip), "{} should be public", ip);
        }
    }

    #[test]
    fn test_is_private_host() {
        let host = |s: &str| is_private_host(&Url::parse(s).unwrap());
        assert!(host("http://127.0.0.1:8080/x"));
        assert!(host("http://169.254.169.254/latest/meta-data/"));
        assert!(host("http://[::1]/"));
        assert!(host("http://[::ffff:10.0.0.1]/"));
        assert!(host("http://localhost/"));
        assert!(host("http://api.LOCALHOST./"));
        assert!(!host("https://example.com/"));
        assert!(!host("http://8.8.8.8/"));
    }

    #[tokio::test]
    async fn test_ensure_public_rejects_literals() {
        for target in [
            "http://127.0.0.1/",
            "http://169.254.169.254/latest/meta-data/iam",
            "http://[::ffff:192.168.0.1]/",
        ] {
            let url = Url::parse(target).unwrap();
            assert!(matches!(
                ensure_public(&url).await,
                Err(SearchError::PrivateAddress(_))
            ));
        }
        assert!(ensure_public(&Url::parse("http://93.184.216.34/").unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_fetch_refuses_private_target() {
        let fetcher = Fetcher::new(&SearchConfig::default()).unwrap();
        let result = fetcher.fetch("http://169.254.169.254/latest/meta-data/").await;
        assert!(matches!(result, Err(SearchError::PrivateAddress(_))));
    }

    #[test]
    fn test_strategy_order() {
        let fetcher = Fetcher::new(&SearchConfig::default()).unwrap();
        let names: Vec<_> = fetcher.strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["direct", "proxy"]);

        let config = SearchConfig::builder().proxy_url(None).build();
        assert_eq!(Fetcher::new(&config).unwrap().strategies().len(), 1);
    }
}
