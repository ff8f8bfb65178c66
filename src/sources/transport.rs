use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::OlsError;

/// Empty query for requests whose URL already carries its parameters.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Issues single GET requests against one deployment and decodes JSON bodies.
#[derive(Clone, Debug)]
pub struct Transport {
    client: ClientWithMiddleware,
    api: String,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Transport {
    pub fn new(
        client: ClientWithMiddleware,
        api: impl Into<String>,
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            api: api.into(),
            headers,
            timeout,
        }
    }

    /// Deployment name used in error messages and logs.
    pub fn api(&self) -> &str {
        &self.api
    }

    /// GETs `url` with `query` appended and returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// - [`OlsError::Transport`] for non-2xx statuses and HTML error pages
    /// - [`OlsError::Decode`] when the body is not JSON
    /// - [`OlsError::Http`]/[`OlsError::HttpMiddleware`] for connection failures
    pub async fn get_json<Q>(&self, url: &str, query: &Q) -> Result<Value, OlsError>
    where
        Q: Serialize + ?Sized,
    {
        let mut req = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .query(query);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let resp = crate::sources::apply_cache_mode(req).send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, &self.api).await?;
        debug!(deployment = %self.api, url, status = status.as_u16(), bytes = bytes.len(), "GET");

        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(OlsError::Transport {
                api: self.api.clone(),
                status: status.as_u16(),
                message: excerpt,
            });
        }

        crate::sources::ensure_json_content_type(
            &self.api,
            status.as_u16(),
            content_type.as_ref(),
            &bytes,
        )?;

        serde_json::from_slice(&bytes).map_err(|source| OlsError::Decode {
            api: self.api.clone(),
            source,
        })
    }

    /// Like [`Transport::get_json`], then deserializes into `T`.
    pub async fn get<T, Q>(&self, url: &str, query: &Q) -> Result<T, OlsError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let value = self.get_json(url, query).await?;
        serde_json::from_value(value).map_err(|source| OlsError::Decode {
            api: self.api.clone(),
            source,
        })
    }
}
