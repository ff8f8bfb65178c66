//! Lazy walk over HAL-style paged responses (`_embedded.<field>` + `_links.next.href`).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::OlsError;
use crate::sources::transport::{NO_QUERY, Transport};

pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Where a deployment puts the item array and the navigation links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageShape {
    pub embedded_key: String,
    pub links_key: String,
}

impl Default for PageShape {
    fn default() -> Self {
        Self {
            embedded_key: "_embedded".to_string(),
            links_key: "_links".to_string(),
        }
    }
}

#[derive(Debug)]
struct Page {
    items: Vec<Value>,
    next: Option<String>,
    number: Option<u64>,
    total_pages: Option<u64>,
}

/// Cursor over one paged collection.
///
/// Each [`Pager::next_chunk`] call fetches exactly one page. The walk ends when a page
/// has no `next` link, or when `next` points at a URL already fetched in this walk.
pub struct Pager {
    transport: Transport,
    shape: PageShape,
    field: String,
    next: Option<Url>,
    visited: HashSet<String>,
    pages_fetched: usize,
    max_pages: usize,
    delay: Option<Duration>,
    seed_ontology: Option<String>,
}

impl Pager {
    /// Starts a walk at `seed_url` with `query` encoded onto it.
    ///
    /// # Errors
    ///
    /// Returns [`OlsError::InvalidArgument`] when `seed_url` is not an absolute URL.
    pub fn new<K, V>(
        transport: Transport,
        seed_url: &str,
        query: &[(K, V)],
        field: impl Into<String>,
        shape: PageShape,
    ) -> Result<Self, OlsError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut seed = Url::parse(seed_url).map_err(|err| {
            OlsError::InvalidArgument(format!("Invalid page URL '{seed_url}': {err}"))
        })?;
        if !query.is_empty() {
            seed.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
        }
        Ok(Self {
            transport,
            shape,
            field: field.into(),
            next: Some(seed),
            visited: HashSet::new(),
            pages_fetched: 0,
            max_pages: DEFAULT_MAX_PAGES,
            delay: None,
            seed_ontology: None,
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Pause before every page after the first.
    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }

    /// Reports a 404 on the first page as [`OlsError::OntologyNotFound`] for `ontology`.
    ///
    /// Failures on later pages are left untouched.
    pub fn with_seed_ontology(mut self, ontology: impl Into<String>) -> Self {
        self.seed_ontology = Some(ontology.into());
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetches the next page and returns its items, or `None` once the walk is over.
    ///
    /// # Errors
    ///
    /// Propagates transport errors unchanged, returns [`OlsError::MalformedPage`] for pages
    /// without the expected structure and [`OlsError::PageLimit`] when the bound is hit.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<Value>>, OlsError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        if self.pages_fetched >= self.max_pages {
            return Err(OlsError::PageLimit {
                limit: self.max_pages,
            });
        }
        if self.pages_fetched > 0
            && let Some(delay) = self.delay
        {
            tokio::time::sleep(delay).await;
        }

        let started = Instant::now();
        self.visited.insert(url.as_str().to_string());
        let body = self
            .transport
            .get_json(url.as_str(), NO_QUERY)
            .await
            .map_err(|err| match (&self.seed_ontology, self.pages_fetched) {
                (Some(ontology), 0) => err.for_ontology(ontology),
                _ => err,
            })?;
        self.pages_fetched += 1;

        let page = parse_page(body, &self.shape, &self.field, url.as_str())?;
        debug!(
            deployment = self.transport.api(),
            field = %self.field,
            page = page.number,
            total_pages = page.total_pages,
            items = page.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched page"
        );

        if let Some(href) = page.next {
            let next = url.join(&href).map_err(|err| OlsError::MalformedPage {
                url: url.to_string(),
                reason: format!("next link '{href}' is not a valid URL: {err}"),
            })?;
            if self.visited.contains(next.as_str()) {
                warn!(
                    deployment = self.transport.api(),
                    next = next.as_str(),
                    "Next link points at an already fetched page; ending pagination"
                );
            } else {
                self.next = Some(next);
            }
        }

        Ok(Some(page.items))
    }

    /// Turns the walk into a lazy stream of items in server order.
    pub fn into_stream(self) -> BoxStream<'static, Result<Value, OlsError>> {
        stream::try_unfold(self, |mut pager| async move {
            Ok::<_, OlsError>(pager.next_chunk().await?.map(|items| (items, pager)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Value, OlsError>)))
        .try_flatten()
        .boxed()
    }
}

fn malformed(url: &str, reason: String) -> OlsError {
    OlsError::MalformedPage {
        url: url.to_string(),
        reason,
    }
}

fn parse_page(body: Value, shape: &PageShape, field: &str, url: &str) -> Result<Page, OlsError> {
    let Value::Object(mut root) = body else {
        return Err(malformed(url, "response body is not a JSON object".into()));
    };

    // OLS leaves out the embedded block entirely when a page has no items.
    let items = match root.remove(&shape.embedded_key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(mut embedded)) => match embedded.remove(field) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(malformed(
                    url,
                    format!("'{}.{field}' is not an array", shape.embedded_key),
                ));
            }
            None => {
                return Err(malformed(
                    url,
                    format!("missing '{}.{field}'", shape.embedded_key),
                ));
            }
        },
        Some(_) => {
            return Err(malformed(
                url,
                format!("'{}' is not an object", shape.embedded_key),
            ));
        }
    };

    let next = root
        .get(&shape.links_key)
        .and_then(|links| links.get("next"))
        .and_then(|next| next.get("href"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string);

    let page_info = root.get("page").and_then(Value::as_object);
    let page_field = |info: Option<&Map<String, Value>>, key: &str| {
        info.and_then(|info| info.get(key)).and_then(Value::as_u64)
    };

    Ok(Page {
        items,
        next,
        number: page_field(page_info, "number"),
        total_pages: page_field(page_info, "totalPages"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> Transport {
        Transport::new(
            crate::sources::uncached_client(),
            "test",
            HeaderMap::new(),
            None,
        )
    }

    fn pager(server: &MockServer, field: &str) -> Pager {
        Pager::new(
            transport(),
            &format!("{}/api/ontologies/chebi/terms", server.uri()),
            &[("size", "2")],
            field,
            PageShape::default(),
        )
        .expect("pager")
    }

    fn page(items: Value, next: Option<String>) -> Value {
        let mut links = json!({"self": {"href": "ignored"}});
        if let Some(next) = next {
            links["next"] = json!({"href": next});
        }
        json!({"_embedded": {"terms": items}, "_links": links})
    }

    async fn mount_page(server: &MockServer, page_number: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path("/api/ontologies/chebi/terms"))
            .and(query_param("page", page_number))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn parse_page_treats_missing_embedded_as_empty() {
        let page = parse_page(
            json!({"_links": {}, "page": {"number": 0, "totalPages": 0}}),
            &PageShape::default(),
            "terms",
            "http://x",
        )
        .unwrap();
        assert!(page.items.is_empty());
        assert!(page.next.is_none());
        assert_eq!(page.total_pages, Some(0));
    }

    #[test]
    fn parse_page_rejects_embedded_without_field() {
        let err = parse_page(
            json!({"_embedded": {"classes": []}}),
            &PageShape::default(),
            "terms",
            "http://x",
        )
        .unwrap_err();
        assert!(matches!(err, OlsError::MalformedPage { .. }));
        assert!(err.to_string().contains("missing '_embedded.terms'"));
    }

    #[test]
    fn parse_page_rejects_non_object_body_and_non_array_field() {
        let shape = PageShape::default();
        assert!(matches!(
            parse_page(json!([1, 2]), &shape, "terms", "http://x"),
            Err(OlsError::MalformedPage { .. })
        ));
        assert!(matches!(
            parse_page(json!({"_embedded": {"terms": {}}}), &shape, "terms", "http://x"),
            Err(OlsError::MalformedPage { .. })
        ));
    }

    #[test]
    fn parse_page_honors_custom_shape() {
        let shape = PageShape {
            embedded_key: "embedded".into(),
            links_key: "links".into(),
        };
        let page = parse_page(
            json!({
                "embedded": {"classes": [{"iri": "A"}]},
                "links": {"next": {"href": " http://x/next "}}
            }),
            &shape,
            "classes",
            "http://x",
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next.as_deref(), Some("http://x/next"));
    }

    #[tokio::test]
    async fn stream_follows_next_links_in_order() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/ontologies/chebi/terms"))
            .and(query_param("size", "2"))
            .and(wiremock::matchers::query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(
                json!([{"iri": "CHEBI:1"}, {"iri": "CHEBI:2"}]),
                Some(format!("{base}?page=1&size=2")),
            )))
            .mount(&server)
            .await;
        mount_page(
            &server,
            "1",
            page(
                json!([{"iri": "CHEBI:3"}]),
                Some(format!("{base}?page=2&size=2")),
            ),
        )
        .await;
        mount_page(&server, "2", page(json!([{"iri": "CHEBI:4"}]), None)).await;

        let items: Vec<Value> = pager(&server, "terms")
            .into_stream()
            .try_collect()
            .await
            .expect("items");
        let iris: Vec<&str> = items.iter().filter_map(|i| i["iri"].as_str()).collect();
        assert_eq!(iris, vec!["CHEBI:1", "CHEBI:2", "CHEBI:3", "CHEBI:4"]);
    }

    #[tokio::test]
    async fn cyclic_next_link_terminates() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        mount_page(
            &server,
            "0",
            page(
                json!([{"iri": "CHEBI:1"}]),
                Some(format!("{base}?page=1&size=2")),
            ),
        )
        .await;
        // Page 1 links back to page 0, which was already fetched.
        mount_page(
            &server,
            "1",
            page(
                json!([{"iri": "CHEBI:2"}]),
                Some(format!("{base}?page=0&size=2")),
            ),
        )
        .await;

        let mut pager = Pager::new(
            transport(),
            &base,
            &[("page", "0"), ("size", "2")],
            "terms",
            PageShape::default(),
        )
        .unwrap();
        let mut seen = 0;
        while let Some(items) = pager.next_chunk().await.expect("page") {
            seen += items.len();
        }
        assert_eq!(seen, 2);
        assert_eq!(pager.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn page_limit_stops_runaway_walks() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        for n in 0..4 {
            mount_page(
                &server,
                &n.to_string(),
                page(
                    json!([{"iri": format!("CHEBI:{n}")}]),
                    Some(format!("{base}?page={}&size=2", n + 1)),
                ),
            )
            .await;
        }

        let pager = Pager::new(
            transport(),
            &base,
            &[("page", "0"), ("size", "2")],
            "terms",
            PageShape::default(),
        )
        .unwrap()
        .with_max_pages(3);
        let err = pager
            .into_stream()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, OlsError::PageLimit { limit: 3 }));
    }

    #[tokio::test]
    async fn empty_page_still_follows_next_link() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        mount_page(
            &server,
            "0",
            json!({"_links": {"next": {"href": format!("{base}?page=1&size=2")}}}),
        )
        .await;
        mount_page(&server, "1", page(json!([{"iri": "CHEBI:9"}]), None)).await;

        let pager = Pager::new(
            transport(),
            &base,
            &[("page", "0"), ("size", "2")],
            "terms",
            PageShape::default(),
        )
        .unwrap();
        let items: Vec<Value> = pager.into_stream().try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn transport_errors_propagate_mid_walk() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        mount_page(
            &server,
            "0",
            page(
                json!([{"iri": "CHEBI:1"}]),
                Some(format!("{base}?page=1&size=2")),
            ),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/ontologies/chebi/terms"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let pager = Pager::new(
            transport(),
            &base,
            &[("page", "0"), ("size", "2")],
            "terms",
            PageShape::default(),
        )
        .unwrap();
        let err = pager
            .into_stream()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, OlsError::Transport { status: 500, .. }));
    }

    #[tokio::test]
    async fn seed_ontology_only_rewrites_first_page_404() {
        let server = MockServer::start().await;
        let base = format!("{}/api/ontologies/chebi/terms", server.uri());
        mount_page(
            &server,
            "0",
            page(
                json!([{"iri": "CHEBI:1"}]),
                Some(format!("{base}?page=1&size=2")),
            ),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/ontologies/chebi/terms"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
            .mount(&server)
            .await;

        let err = Pager::new(
            transport(),
            &base,
            &[("page", "0"), ("size", "2")],
            "terms",
            PageShape::default(),
        )
        .unwrap()
        .with_seed_ontology("chebi")
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
        assert!(matches!(err, OlsError::Transport { status: 404, .. }));

        let err = Pager::new(
            transport(),
            &format!("{}/api/ontologies/nope/terms", server.uri()),
            NO_QUERY,
            "terms",
            PageShape::default(),
        )
        .unwrap()
        .with_seed_ontology("nope")
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            OlsError::OntologyNotFound { ref ontology, .. } if ontology == "nope"
        ));
    }

    #[test]
    fn new_rejects_relative_seed() {
        let err = Pager::new(
            transport(),
            "ontologies/chebi/terms",
            NO_QUERY,
            "terms",
            PageShape::default(),
        )
        .err()
        .expect("relative URL should fail");
        assert!(matches!(err, OlsError::InvalidArgument(_)));
    }
}
