#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum OlsError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("HTTP {status} from {api}: {message}")]
    Transport {
        api: String,
        status: u16,
        message: String,
    },

    #[error("Invalid JSON from {api}: {source}")]
    Decode {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed page from {url}: {reason}")]
    MalformedPage { url: String, reason: String },

    #[error("Malformed item #{index}: missing or invalid '{field}'")]
    MalformedItem { field: String, index: usize },

    #[error("Ontology '{ontology}' not found.\n\n{suggestion}")]
    OntologyNotFound {
        ontology: String,
        suggestion: String,
    },

    #[error("Pagination stopped after {limit} pages without reaching the last page")]
    PageLimit { limit: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OlsError {
    /// Rewrites an HTTP 404 into [`OlsError::OntologyNotFound`] for `ontology`.
    pub(crate) fn for_ontology(self, ontology: &str) -> Self {
        match self {
            Self::Transport { status: 404, .. } => Self::OntologyNotFound {
                ontology: ontology.to_string(),
                suggestion: "List available ontologies with: ols ontologies".to_string(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OlsError;

    #[test]
    fn not_found_display_includes_suggestion() {
        let err = OlsError::Transport {
            api: "ebi".to_string(),
            status: 404,
            message: "no such ontology".to_string(),
        }
        .for_ontology("not-a-real-ontology");

        assert!(matches!(err, OlsError::OntologyNotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("'not-a-real-ontology' not found"));
        assert!(msg.contains("ols ontologies"));
    }

    #[test]
    fn for_ontology_keeps_other_statuses() {
        let err = OlsError::Transport {
            api: "ebi".to_string(),
            status: 503,
            message: "maintenance".to_string(),
        }
        .for_ontology("chebi");

        assert!(matches!(err, OlsError::Transport { status: 503, .. }));
        assert!(err.to_string().contains("HTTP 503 from ebi"));
    }

    #[test]
    fn malformed_item_display_names_field() {
        let err = OlsError::MalformedItem {
            field: "iri".to_string(),
            index: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("#3"));
        assert!(msg.contains("'iri'"));
    }

    #[test]
    fn page_limit_display_includes_limit() {
        let err = OlsError::PageLimit { limit: 25 };
        assert!(err.to_string().contains("25 pages"));
    }
}
