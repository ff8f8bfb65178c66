//! HTTP plumbing, pagination, and deployment clients for OLS-compatible APIs.

use std::borrow::Cow;
use std::future::Future;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use http_cache_reqwest::{
    CACacheManager, Cache, CacheMode, CacheOptions, HttpCache, HttpCacheOptions,
};
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::warn;

use crate::error::OlsError;

pub mod deployment;
pub mod ols;
pub mod pager;
pub(crate) mod rate_limit;
pub mod transport;

const ERROR_BODY_MAX_BYTES: usize = 2048;
// Full-size term pages from large ontologies run to several megabytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

static HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();

tokio::task_local! {
    static NO_CACHE: bool;
}

/// Runs `fut` with the response cache bypassed when `no_cache` is set.
pub async fn with_no_cache<R, F>(no_cache: bool, fut: F) -> R
where
    F: Future<Output = R>,
{
    NO_CACHE.scope(no_cache, fut).await
}

pub(crate) fn apply_cache_mode(req: RequestBuilder) -> RequestBuilder {
    match NO_CACHE.try_with(|v| *v) {
        Ok(true) => req.with_extension(CacheMode::NoStore),
        _ => req,
    }
}

pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    crate::config::env_value(env_var)
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(default))
}

fn base_http_client() -> Result<reqwest::Client, OlsError> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-stale=86400"));

    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("ols-client/", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers)
        .build()
        .map_err(OlsError::HttpClientInit)
}

/// Builds an HTTP client with retry, rate limiting, and a disk cache rooted at `cache_root`.
///
/// - Retry: 3 attempts with exponential backoff for transient errors
/// - Cache: keyed by request URL, stored under `<cache_root>/http-cacache`
/// - Cache TTL: `Cache-Control: max-stale=86400` keeps responses without caching headers
///   usable for 24h
pub fn build_client(cache_root: &Path) -> Result<ClientWithMiddleware, OlsError> {
    let base_client = base_http_client()?;
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    let cache_path = crate::utils::paths::http_cache_dir(cache_root);
    std::fs::create_dir_all(&cache_path)?;

    let cache_options = HttpCacheOptions {
        cache_options: Some(CacheOptions {
            // Shared-cache semantics: do not store private/authenticated responses.
            shared: true,
            ..CacheOptions::default()
        }),
        ..HttpCacheOptions::default()
    };

    Ok(ClientBuilder::new(base_client)
        .with(Cache(HttpCache {
            mode: CacheMode::Default,
            manager: CACacheManager { path: cache_path },
            options: cache_options,
        }))
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(rate_limit::RateLimitMiddleware::new())
        .build())
}

/// Returns the process-wide client using the default cache directory.
pub fn shared_client() -> Result<ClientWithMiddleware, OlsError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = build_client(&crate::utils::paths::ols_cache_dir())?;

    match HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| {
                OlsError::InvalidArgument("Shared HTTP client initialization race".into())
            }),
    }
}

/// A middleware client with no cache, retry, or rate limiting.
#[cfg(test)]
pub(crate) fn uncached_client() -> ClientWithMiddleware {
    ClientBuilder::new(reqwest::Client::new()).build()
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    status: u16,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), OlsError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                deployment = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_html = matches!(media_type.as_str(), "text/html" | "application/xhtml+xml");
    if is_html {
        return Err(OlsError::Transport {
            api: api.to_string(),
            status,
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    // OLS serves HAL documents as application/hal+json.
    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            deployment = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, OlsError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(OlsError::Transport {
                api: api.to_string(),
                status: resp.status().as_u16(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
