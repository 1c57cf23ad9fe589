//! Shared HTTP plumbing: client construction, header merging, and a
//! timeout-bounded fetch.
//!
//! One [`reqwest::Client`] is built per aggregator and reused by every
//! source task, so connection pools are shared across sources.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::config::AggregatorConfig;
use crate::error::{Result, SearchError};

/// Longest body excerpt carried into an HTTP error message.
const ERROR_BODY_EXCERPT_CHARS: usize = 200;

/// Build the [`reqwest::Client`] shared by the normalizer and all sources.
///
/// Timeouts are not set on the client; every call site passes its own
/// budget to [`fetch_with_timeout`].
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Default headers sent to every source: `User-Agent` and `Accept`.
pub fn default_headers(config: &AggregatorConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value(&config.user_agent)?);
    headers.insert(ACCEPT, header_value(&config.accept)?);
    Ok(headers)
}

/// Overlay per-source `overrides` on top of `defaults`.
///
/// Header names compare case-insensitively, so an override of `user-agent`
/// replaces the default `User-Agent`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] naming the offending header if an
/// override has an invalid name or value.
pub fn merge_headers(defaults: &HeaderMap, overrides: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut merged = defaults.clone();
    for (name, value) in overrides {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SearchError::Config(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| SearchError::Config(format!("invalid value for header {name}: {e}")))?;
        merged.insert(header_name, header_value);
    }
    Ok(merged)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SearchError::Config(format!("invalid header value {value:?}: {e}")))
}

/// Send `request` and read the full body, all within `timeout`.
///
/// The whole exchange (connect, headers, body) shares one deadline, so a
/// server that trickles its body cannot hold the caller past `timeout`.
///
/// # Errors
///
/// - [`SearchError::Timeout`] if the deadline passes
/// - [`SearchError::Transport`] if no HTTP response arrives or the
///   connection drops while the body is being read
/// - [`SearchError::Http`] for a non-2xx status
pub async fn fetch_with_timeout(request: reqwest::RequestBuilder, timeout: Duration) -> Result<Bytes> {
    let exchange = async {
        let response = request.send().await.map_err(SearchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: describe_status(status, &body),
            });
        }
        let body = response.bytes().await.map_err(|e| {
            SearchError::Transport(format!("failed to read response body: {}", e.without_url()))
        })?;
        Ok::<_, SearchError>(body)
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Human-readable message for a non-success status.
fn describe_status(status: reqwest::StatusCode, body: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("unexpected status");
    let excerpt: String = body.trim().chars().take(ERROR_BODY_EXCERPT_CHARS).collect();
    if excerpt.is_empty() {
        reason.to_owned()
    } else {
        format!("{reason} ({excerpt})")
    }
}

/// A raw TCP server that announces a 1000-byte body, sends a few bytes of
/// it, then closes the connection.
#[cfg(test)]
pub(crate) mod truncated {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
Content-Length: 1000\r\n\
\r\n\
{\"list\":[";

    /// Start the server. Returns its base URL and a connection counter.
    pub(crate) async fn serve() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(RESPONSE).await;
                let _ = stream.flush().await;
            }
        });
        (format!("http://{addr}"), connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn build_client_succeeds() {
        assert!(build_client().is_ok());
    }

    #[test]
    fn default_headers_carry_user_agent_and_accept() {
        let config = AggregatorConfig::default();
        let headers = default_headers(&config).expect("headers");
        assert_eq!(
            headers.get(USER_AGENT).and_then(|v| v.to_str().ok()),
            Some(config.user_agent.as_str())
        );
        assert_eq!(
            headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
            Some(config.accept.as_str())
        );
    }

    #[test]
    fn overrides_win_case_insensitively() {
        let defaults = default_headers(&AggregatorConfig::default()).expect("headers");
        let mut overrides = BTreeMap::new();
        overrides.insert("user-agent".to_owned(), "SourceBot/2.0".to_owned());
        overrides.insert("Referer".to_owned(), "https://a.example/".to_owned());

        let merged = merge_headers(&defaults, &overrides).expect("merge");
        assert_eq!(merged.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(
            merged.get(USER_AGENT).and_then(|v| v.to_str().ok()),
            Some("SourceBot/2.0")
        );
        assert_eq!(
            merged.get("referer").and_then(|v| v.to_str().ok()),
            Some("https://a.example/")
        );
        assert!(merged.contains_key(ACCEPT));
    }

    #[test]
    fn invalid_override_name_rejected() {
        let defaults = HeaderMap::new();
        let mut overrides = BTreeMap::new();
        overrides.insert("bad header".to_owned(), "x".to_owned());
        let err = merge_headers(&defaults, &overrides).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn describe_status_includes_excerpt() {
        let message = describe_status(reqwest::StatusCode::BAD_GATEWAY, "  upstream down ");
        assert_eq!(message, "Bad Gateway (upstream down)");
        let message = describe_status(reqwest::StatusCode::NOT_FOUND, "");
        assert_eq!(message, "Not Found");
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = build_client().expect("client");
        let request = client.get(format!("{}/ok", server.uri()));
        let body = fetch_with_timeout(request, Duration::from_secs(2))
            .await
            .expect("fetch");
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn fetch_maps_status_to_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = build_client().expect("client");
        let err = fetch_with_timeout(client.get(server.uri()), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Http { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = build_client().expect("client");
        let err = fetch_with_timeout(client.get(server.uri()), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Timeout(_)));
    }

    #[tokio::test]
    async fn fetch_connection_refused_is_transport_error() {
        let client = build_client().expect("client");
        // Port 9 (discard) is almost never listening on test hosts.
        let err = fetch_with_timeout(client.get("http://127.0.0.1:9/"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn connection_dropped_mid_body_is_transport_error() {
        let (base, connections) = truncated::serve().await;
        let client = build_client().expect("client");
        let err = fetch_with_timeout(client.get(format!("{base}/")), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Transport(_)), "got {err:?}");
        assert!(err.is_retryable());
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}
