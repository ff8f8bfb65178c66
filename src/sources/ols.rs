//! Aggregating read operations over one OLS deployment.

use std::collections::{BTreeMap, BTreeSet};

use futures::TryStreamExt;
use futures::stream::BoxStream;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::OlsError;
use crate::sources::deployment::DeploymentConfig;
use crate::sources::pager::{PageShape, Pager};
use crate::sources::transport::{NO_QUERY, Transport};
use crate::utils::query::encode_iri_segment;
use crate::utils::serde::StringOrVec;

/// Term IRI to preferred label.
pub type LabelMap = BTreeMap<String, String>;
/// Term IRI to the IRIs of its parents.
pub type Hierarchy = BTreeMap<String, BTreeSet<String>>;
/// Ontology record as served, minus navigation fields.
pub type OntologyMetadata = Map<String, Value>;

const NAVIGATION_FIELDS: [&str; 2] = ["_links", "_embedded"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OntologySummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_terms: Option<u64>,
}

pub struct OlsApi {
    config: DeploymentConfig,
    transport: Transport,
}

/// Lowercases and validates a short ontology name such as `chebi`.
fn normalize_ontology_id(value: &str) -> Result<String, OlsError> {
    let id = value.trim().to_ascii_lowercase();
    if id.is_empty() {
        return Err(OlsError::InvalidArgument(
            "Ontology identifier is required (e.g., chebi)".into(),
        ));
    }
    if id.chars().any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace()) {
        return Err(OlsError::InvalidArgument(format!(
            "Invalid ontology identifier '{}'",
            value.trim()
        )));
    }
    Ok(id)
}

fn required_iri(item: &Value, field: &str, index: usize) -> Result<String, OlsError> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|iri| !iri.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OlsError::MalformedItem {
            field: field.to_string(),
            index,
        })
}

fn optional_values(item: &Value, field: &str, index: usize) -> Result<StringOrVec, OlsError> {
    StringOrVec::from_field(item, field).ok_or_else(|| OlsError::MalformedItem {
        field: field.to_string(),
        index,
    })
}

fn is_root(term: &Value) -> bool {
    term.get("is_root").and_then(Value::as_bool).unwrap_or(false)
}

fn json_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn summary_from_record(record: &Value, index: usize) -> Result<OntologySummary, OlsError> {
    let id = json_str(record, "/ontologyId").ok_or_else(|| OlsError::MalformedItem {
        field: "ontologyId".into(),
        index,
    })?;
    Ok(OntologySummary {
        id,
        title: json_str(record, "/config/title"),
        version: json_str(record, "/config/version").or_else(|| json_str(record, "/version")),
        status: json_str(record, "/status"),
        num_terms: record.get("numberOfTerms").and_then(Value::as_u64),
    })
}

impl OlsApi {
    /// Uses the process-wide cached HTTP client.
    pub fn new(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self::with_client(config, crate::sources::shared_client()?))
    }

    pub fn with_client(config: DeploymentConfig, client: ClientWithMiddleware) -> Self {
        let transport = Transport::new(
            client,
            config.name.clone(),
            config.headers.clone(),
            config.timeout,
        );
        Self { config, transport }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn shape(&self) -> PageShape {
        self.config.shape.clone()
    }

    fn pager(&self, path: &str, field: &str) -> Result<Pager, OlsError> {
        let size = self.config.page_size().to_string();
        Ok(Pager::new(
            self.transport.clone(),
            &self.endpoint(path),
            &[("size", size.as_str())],
            field,
            self.shape(),
        )?
        .with_max_pages(self.config.max_pages)
        .with_delay(self.config.page_delay))
    }

    /// Pager over a link taken verbatim from a term record.
    fn link_pager(&self, url: &str) -> Result<Pager, OlsError> {
        Ok(Pager::new(
            self.transport.clone(),
            url,
            NO_QUERY,
            &self.config.terms_field,
            self.shape(),
        )?
        .with_max_pages(self.config.max_pages)
        .with_delay(self.config.page_delay))
    }

    /// Lazy stream of the items under `field` for every page starting at `path`.
    pub fn iter_paged(
        &self,
        path: &str,
        field: &str,
    ) -> Result<BoxStream<'static, Result<Value, OlsError>>, OlsError> {
        Ok(self.pager(path, field)?.into_stream())
    }

    /// Like [`OlsApi::iter_paged`], with a 404 on the first page reported as an unknown
    /// `ontology`.
    fn iter_ontology_paged(
        &self,
        ontology: &str,
        path: &str,
        field: &str,
    ) -> Result<BoxStream<'static, Result<Value, OlsError>>, OlsError> {
        Ok(self
            .pager(path, field)?
            .with_seed_ontology(ontology)
            .into_stream())
    }

    /// Walks `path`, handing every item and its position to `visit`.
    async fn fold_items<F>(
        &self,
        ontology: &str,
        path: &str,
        field: &str,
        mut visit: F,
    ) -> Result<usize, OlsError>
    where
        F: FnMut(usize, Value) -> Result<(), OlsError>,
    {
        let mut stream = self.iter_ontology_paged(ontology, path, field)?;
        let mut index = 0;
        while let Some(item) = stream.try_next().await? {
            visit(index, item)?;
            index += 1;
        }
        Ok(index)
    }

    pub async fn list_ontologies(&self) -> Result<Vec<OntologySummary>, OlsError> {
        let mut out = Vec::new();
        let mut stream = self.iter_paged("ontologies", &self.config.ontologies_field)?;
        while let Some(record) = stream.try_next().await? {
            out.push(summary_from_record(&record, out.len())?);
        }
        info!(deployment = %self.config.name, ontologies = out.len(), "Listed ontologies");
        Ok(out)
    }

    pub async fn get_metadata(&self, ontology: &str) -> Result<OntologyMetadata, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let url = self.endpoint(&format!("ontologies/{ontology}"));
        let body = self
            .transport
            .get_json(&url, NO_QUERY)
            .await
            .map_err(|err| err.for_ontology(&ontology))?;
        let Value::Object(mut record) = body else {
            return Err(OlsError::MalformedPage {
                url,
                reason: "ontology record is not a JSON object".into(),
            });
        };
        for field in NAVIGATION_FIELDS {
            record.remove(field);
        }
        Ok(record)
    }

    pub async fn get_description(&self, ontology: &str) -> Result<Option<String>, OlsError> {
        let metadata = self.get_metadata(ontology).await?;
        Ok(json_str(&Value::Object(metadata), "/config/description"))
    }

    pub async fn get_labels(&self, ontology: &str) -> Result<LabelMap, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let iri_field = self.config.iri_field.as_str();
        let label_field = self.config.label_field.as_str();

        let mut labels = LabelMap::new();
        let seen = self
            .fold_items(
                &ontology,
                &format!("ontologies/{ontology}/terms"),
                &self.config.terms_field,
                |index, item| {
                    let iri = required_iri(&item, iri_field, index)?;
                    if let Some(label) = optional_values(&item, label_field, index)?.first() {
                        labels.insert(iri, label.to_string());
                    }
                    Ok(())
                },
            )
            .await?;
        info!(ontology = %ontology, terms = seen, labels = labels.len(), "Collected labels");
        Ok(labels)
    }

    /// Term IRI to parent IRIs.
    ///
    /// Parents come from `parent_field` when a record embeds it. Otherwise the record's
    /// `parent_link` (`_links.parents` on v1 APIs) is walked; roots get an empty set.
    pub async fn get_hierarchy(&self, ontology: &str) -> Result<Hierarchy, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let iri_field = self.config.iri_field.as_str();
        let parent_field = self.config.parent_field.as_str();
        let path = self.config.hierarchy_path.replace("{ontology}", &ontology);
        let parents_pointer = format!(
            "/{}/{}/href",
            self.config.shape.links_key, self.config.parent_link
        );

        let mut hierarchy = Hierarchy::new();
        let mut terms = self.iter_ontology_paged(&ontology, &path, &self.config.terms_field)?;
        let mut index = 0;
        while let Some(term) = terms.try_next().await? {
            let iri = required_iri(&term, iri_field, index)?;
            let parents = match optional_values(&term, parent_field, index)? {
                StringOrVec::None if !is_root(&term) => match json_str(&term, &parents_pointer) {
                    Some(url) => self.linked_iris(&url).await?,
                    None => BTreeSet::new(),
                },
                values => values.into_set(),
            };
            hierarchy.entry(iri).or_default().extend(parents);
            index += 1;
        }
        info!(ontology = %ontology, terms = index, nodes = hierarchy.len(), "Collected hierarchy");
        Ok(hierarchy)
    }

    async fn linked_iris(&self, url: &str) -> Result<BTreeSet<String>, OlsError> {
        let mut stream = self.link_pager(url)?.into_stream();
        let mut iris = BTreeSet::new();
        let mut index = 0;
        while let Some(item) = stream.try_next().await? {
            iris.insert(required_iri(&item, &self.config.iri_field, index)?);
            index += 1;
        }
        Ok(iris)
    }

    pub fn iter_terms(
        &self,
        ontology: &str,
    ) -> Result<BoxStream<'static, Result<Value, OlsError>>, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        self.iter_ontology_paged(
            &ontology,
            &format!("ontologies/{ontology}/terms"),
            &self.config.terms_field,
        )
    }

    /// Raw term lookup by IRI.
    pub async fn get_term(&self, ontology: &str, iri: &str) -> Result<Value, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let iri = iri.trim();
        if iri.is_empty() {
            return Err(OlsError::InvalidArgument("Term IRI is required".into()));
        }
        let url = self.endpoint(&format!("ontologies/{ontology}/terms"));
        self.transport.get_json(&url, &[("iri", iri)]).await
    }

    pub async fn search(&self, query: &str, fields: &[String]) -> Result<Vec<Value>, OlsError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OlsError::InvalidArgument("Search query is required".into()));
        }
        let url = self.endpoint("search");
        let mut params = vec![("q", query.to_string())];
        if !fields.is_empty() {
            params.push(("queryFields", fields.join(",")));
        }
        let mut body = self.transport.get_json(&url, &params).await?;
        match body.pointer_mut("/response/docs").map(Value::take) {
            Some(Value::Array(docs)) => Ok(docs),
            _ => Err(OlsError::MalformedPage {
                url,
                reason: "missing 'response.docs' array".into(),
            }),
        }
    }

    pub async fn suggest(&self, query: &str, ontologies: &[String]) -> Result<Value, OlsError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OlsError::InvalidArgument("Suggest query is required".into()));
        }
        let url = self.endpoint("suggest");
        let mut params = vec![("q", query.to_string())];
        if !ontologies.is_empty() {
            params.push(("ontology", ontologies.join(",")));
        }
        self.transport.get_json(&url, &params).await
    }

    /// Ancestors of `iri`; `hierarchical` restricts to is-a/part-of style edges.
    pub fn iter_ancestors(
        &self,
        ontology: &str,
        iri: &str,
        hierarchical: bool,
    ) -> Result<BoxStream<'static, Result<Value, OlsError>>, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let relation = if hierarchical {
            "hierarchicalAncestors"
        } else {
            "ancestors"
        };
        self.iter_paged(
            &format!(
                "ontologies/{ontology}/terms/{}/{relation}",
                encode_iri_segment(iri.trim())
            ),
            &self.config.terms_field,
        )
    }

    pub async fn ancestor_labels(
        &self,
        ontology: &str,
        iri: &str,
        hierarchical: bool,
    ) -> Result<Vec<String>, OlsError> {
        let label_field = self.config.label_field.clone();
        let mut stream = self.iter_ancestors(ontology, iri, hierarchical)?;
        let mut labels = Vec::new();
        while let Some(term) = stream.try_next().await? {
            if let Some(label) = optional_values(&term, &label_field, labels.len())?.first() {
                labels.push(label.to_string());
            }
        }
        Ok(labels)
    }

    /// Parent/child label pairs, following each term's `hierarchicalChildren` link.
    pub async fn hierarchy_label_edges(
        &self,
        ontology: &str,
    ) -> Result<Vec<(String, String)>, OlsError> {
        let label_field = self.config.label_field.clone();
        let iri_field = self.config.iri_field.clone();
        let children_pointer = format!(
            "/{}/hierarchicalChildren/href",
            self.config.shape.links_key
        );

        let mut edges = Vec::new();
        let mut terms = self.iter_terms(ontology)?;
        let mut index = 0;
        while let Some(term) = terms.try_next().await? {
            let Some(children_url) = json_str(&term, &children_pointer) else {
                index += 1;
                continue;
            };
            let parent = optional_values(&term, &label_field, index)?
                .first()
                .map(str::to_string)
                .map_or_else(|| required_iri(&term, &iri_field, index), Ok)?;

            let children: Vec<Value> = self
                .link_pager(&children_url)?
                .into_stream()
                .try_collect()
                .await?;
            for (child_index, child) in children.iter().enumerate() {
                let child_label = optional_values(child, &label_field, child_index)?
                    .first()
                    .map(str::to_string)
                    .map_or_else(|| required_iri(child, &iri_field, child_index), Ok)?;
                edges.push((parent.clone(), child_label));
            }
            index += 1;
        }
        Ok(edges)
    }

    /// Text embedding of a term from the v2 API.
    pub async fn get_embedding(&self, ontology: &str, iri: &str) -> Result<Vec<f64>, OlsError> {
        let ontology = normalize_ontology_id(ontology)?;
        let url = self.endpoint(&format!(
            "v2/ontologies/{ontology}/classes/{}/llm_embedding",
            encode_iri_segment(iri.trim())
        ));
        self.transport.get(&url, NO_QUERY).await
    }
}
