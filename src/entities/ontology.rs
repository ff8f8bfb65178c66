//! Module-level shortcuts that build a fresh default client per call.

use futures::TryStreamExt;
use serde::Serialize;

use crate::config::Settings;
use crate::error::OlsError;
use crate::sources::deployment::{OntologyLookup, client_from_settings};
use crate::sources::ols::{Hierarchy, LabelMap, OntologyMetadata, OntologySummary};

/// Builds a client from the config file and environment.
///
/// Nothing is shared between calls, so callers can hold clients on different tasks freely.
pub fn default_client() -> Result<Box<dyn OntologyLookup>, OlsError> {
    client_from_settings(&Settings::load()?)
}

pub async fn get_labels(ontology: &str) -> Result<LabelMap, OlsError> {
    default_client()?.get_labels(ontology).await
}

pub async fn get_hierarchy(ontology: &str) -> Result<Hierarchy, OlsError> {
    default_client()?.get_hierarchy(ontology).await
}

pub async fn get_metadata(ontology: &str) -> Result<OntologyMetadata, OlsError> {
    default_client()?.get_metadata(ontology).await
}

pub async fn get_description(ontology: &str) -> Result<Option<String>, OlsError> {
    default_client()?.get_description(ontology).await
}

pub async fn list_ontologies() -> Result<Vec<OntologySummary>, OlsError> {
    default_client()?.list_ontologies().await
}

/// One row per hierarchy node, for flat output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyEdge {
    pub child: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Flattens a hierarchy; parentless terms produce a single row without a parent.
pub fn hierarchy_edges(hierarchy: &Hierarchy) -> Vec<HierarchyEdge> {
    let mut out = Vec::new();
    for (child, parents) in hierarchy {
        if parents.is_empty() {
            out.push(HierarchyEdge {
                child: child.clone(),
                parent: None,
            });
            continue;
        }
        out.extend(parents.iter().map(|parent| HierarchyEdge {
            child: child.clone(),
            parent: Some(parent.clone()),
        }));
    }
    out
}

/// Counts term items without materializing them.
pub async fn count_terms(client: &dyn OntologyLookup, ontology: &str) -> Result<usize, OlsError> {
    client
        .iter_terms(ontology)?
        .try_fold(0usize, |count, _| async move { Ok(count + 1) })
        .await
}
