use std::sync::OnceLock;

use minijinja::{Environment, context};
use serde_json::Value;

use crate::error::OlsError;
use crate::sources::ols::{OntologyMetadata, OntologySummary};

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

// Fields already shown in the header rows, plus bulky nested blocks.
const METADATA_HEADER_FIELDS: [&str; 6] = [
    "ontologyId",
    "numberOfTerms",
    "status",
    "config",
    "version",
    "languages",
];

#[derive(serde::Serialize)]
struct FieldRow {
    key: String,
    value: String,
}

#[derive(serde::Serialize)]
struct SearchRow {
    label: String,
    id: String,
    ontology: String,
    iri: String,
}

fn env() -> Result<&'static Environment<'static>, OlsError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_filter("truncate", |s: String, max_bytes: usize| -> String {
        if s.len() <= max_bytes {
            return s;
        }
        if max_bytes == 0 {
            return "…".to_string();
        }
        let mut boundary = max_bytes;
        while boundary > 0 && !s.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let mut out = s[..boundary].trim_end().to_string();
        out.push('…');
        out
    });
    env.add_template(
        "metadata.md.j2",
        include_str!("../../templates/metadata.md.j2"),
    )?;
    env.add_template(
        "ontologies.md.j2",
        include_str!("../../templates/ontologies.md.j2"),
    )?;
    env.add_template("search.md.j2", include_str!("../../templates/search.md.j2"))?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| {
        OlsError::InvalidArgument("Markdown template environment failed to initialize".into())
    })
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| text_of(Some(v))).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}

pub fn metadata_markdown(ontology: &str, metadata: &OntologyMetadata) -> Result<String, OlsError> {
    let config = metadata.get("config");
    let config_text = |key: &str| text_of(config.and_then(|c| c.get(key)));

    let extra: Vec<FieldRow> = metadata
        .iter()
        .filter(|(key, _)| !METADATA_HEADER_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            text_of(Some(value)).map(|value| FieldRow {
                key: key.clone(),
                value: value.replace('|', "\\|"),
            })
        })
        .collect();

    let tmpl = env()?.get_template("metadata.md.j2")?;
    let body = tmpl.render(context! {
        ontology_id => text_of(metadata.get("ontologyId")).unwrap_or_else(|| ontology.to_string()),
        title => config_text("title"),
        version => config_text("version").or_else(|| text_of(metadata.get("version"))),
        num_terms => metadata.get("numberOfTerms").and_then(Value::as_u64),
        status => text_of(metadata.get("status")),
        homepage => config_text("homepage"),
        description => config_text("description"),
        extra => extra,
    })?;
    Ok(body)
}

pub fn ontologies_markdown(deployment: &str, rows: &[OntologySummary]) -> Result<String, OlsError> {
    let tmpl = env()?.get_template("ontologies.md.j2")?;
    let body = tmpl.render(context! {
        deployment => deployment,
        rows => rows,
    })?;
    Ok(body)
}

pub fn search_markdown(query: &str, docs: &[Value]) -> Result<String, OlsError> {
    let rows: Vec<SearchRow> = docs
        .iter()
        .map(|doc| SearchRow {
            label: text_of(doc.get("label")).unwrap_or_else(|| "-".into()),
            id: text_of(doc.get("obo_id"))
                .or_else(|| text_of(doc.get("short_form")))
                .unwrap_or_else(|| "-".into()),
            ontology: text_of(doc.get("ontology_name")).unwrap_or_else(|| "-".into()),
            iri: text_of(doc.get("iri")).unwrap_or_else(|| "-".into()),
        })
        .collect();

    let tmpl = env()?.get_template("search.md.j2")?;
    let body = tmpl.render(context! {
        query => query,
        rows => rows,
        web_search_url => crate::utils::query::user_search_url(query),
    })?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> OntologyMetadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn metadata_markdown_shows_config_fields() {
        let md = metadata_markdown(
            "duo",
            &metadata(json!({
                "ontologyId": "duo",
                "numberOfTerms": 345,
                "status": "LOADED",
                "loaded": "2024-01-01T00:00:00",
                "config": {
                    "title": "Data Use Ontology",
                    "version": "2021-02-23",
                    "description": "DUO allows users to semantically tag datasets."
                }
            })),
        )
        .expect("markdown");
        assert!(md.starts_with("# Data Use Ontology"));
        assert!(md.contains("| Terms | 345 |"));
        assert!(md.contains("| Version | 2021-02-23 |"));
        assert!(md.contains("| loaded | 2024-01-01T00:00:00 |"));
        assert!(md.contains("## Description"));
    }

    #[test]
    fn metadata_markdown_falls_back_to_identifier() {
        let md = metadata_markdown("xyz", &metadata(json!({"config": {}}))).expect("markdown");
        assert!(md.starts_with("# xyz"));
        assert!(!md.contains("## Description"));
    }

    #[test]
    fn ontologies_markdown_renders_rows() {
        let rows = vec![
            OntologySummary {
                id: "duo".into(),
                title: Some("Data Use Ontology".into()),
                version: None,
                status: None,
                num_terms: Some(345),
            },
            OntologySummary {
                id: "go".into(),
                title: None,
                version: None,
                status: None,
                num_terms: None,
            },
        ];
        let md = ontologies_markdown("ebi", &rows).expect("markdown");
        assert!(md.contains("# Ontologies (ebi)"));
        assert!(md.contains("| duo | Data Use Ontology | - | 345 |"));
        assert!(md.contains("| go | - | - | - |"));
        assert!(md.contains("2 ontologies."));
    }

    #[test]
    fn search_markdown_links_web_search_when_empty() {
        let md = search_markdown("lung cancer", &[]).expect("markdown");
        assert!(md.contains("No results."));
        assert!(md.contains("https://www.ebi.ac.uk/ols4/search?q=lung+cancer"));

        let md = search_markdown(
            "heart",
            &[json!({
                "label": "heart",
                "obo_id": "UBERON:0000948",
                "ontology_name": "uberon",
                "iri": "http://purl.obolibrary.org/obo/UBERON_0000948"
            })],
        )
        .expect("markdown");
        assert!(md.contains("| heart | UBERON:0000948 | uberon |"));
    }
}
