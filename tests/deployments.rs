use futures::TryStreamExt;
use ols_client::{CustomClient, DeploymentConfig, OlsError, OntologyLookup};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CustomClient {
    let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
    CustomClient::with_client(DeploymentConfig::new("custom", &server.uri()), http)
}

fn page(field: &str, items: Value, next: Option<String>) -> Value {
    let mut body = json!({"_embedded": {field: items}, "_links": {}});
    if let Some(next) = next {
        body["_links"]["next"] = json!({"href": next});
    }
    body
}

async fn mount_go_terms(server: &MockServer) {
    let next = format!(
        "{}/api/ontologies/go/terms?page=1&size=500",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/api/ontologies/go/terms"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "terms",
            json!([
                {"iri": "GO:0008150", "label": "biological_process"},
                {"iri": "GO:0009987", "label": ["cellular process"], "directParent": "GO:0008150"}
            ]),
            Some(next),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ontologies/go/terms"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "terms",
            json!([
                {
                    "iri": "GO:0051179",
                    "label": "localization",
                    "directParent": ["GO:0008150", "GO:0009987"]
                }
            ]),
            None,
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn custom_deployment_walks_labels_and_hierarchy_across_pages() {
    let server = MockServer::start().await;
    mount_go_terms(&server).await;
    let client = client_for(&server);

    let labels = client.get_labels("GO").await.expect("labels");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels["GO:0009987"], "cellular process");

    let hierarchy = client.get_hierarchy("go").await.expect("hierarchy");
    assert!(hierarchy["GO:0008150"].is_empty());
    assert_eq!(
        hierarchy["GO:0051179"].iter().cloned().collect::<Vec<_>>(),
        vec!["GO:0008150".to_string(), "GO:0009987".to_string()]
    );

    let edges = ols_client::hierarchy_edges(&hierarchy);
    assert_eq!(edges.len(), 4);

    let count = ols_client::count_terms(&client, "go").await.expect("count");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn raw_term_stream_preserves_page_order() {
    let server = MockServer::start().await;
    mount_go_terms(&server).await;
    let client = client_for(&server);

    let terms: Vec<Value> = client
        .iter_terms("go")
        .expect("stream")
        .try_collect()
        .await
        .expect("terms");
    let iris: Vec<&str> = terms.iter().filter_map(|t| t["iri"].as_str()).collect();
    assert_eq!(iris, vec!["GO:0008150", "GO:0009987", "GO:0051179"]);
}

#[tokio::test]
async fn unknown_ontology_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ontologies/nope/terms"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client.get_labels("nope").await.expect_err("missing ontology");
    assert!(matches!(err, OlsError::OntologyNotFound { ref ontology, .. } if ontology == "nope"));
}

#[tokio::test]
async fn metadata_and_listing_come_from_ontology_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ontologies/duo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ontologyId": "duo",
            "numberOfTerms": 345,
            "config": {
                "title": "Data Use Ontology",
                "description": "Tags datasets with use restrictions."
            },
            "_links": {"self": {"href": "x"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ontologies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "ontologies",
            json!([{"ontologyId": "duo", "config": {"title": "Data Use Ontology"}}]),
            None,
        )))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let metadata = client.get_metadata("duo").await.expect("metadata");
    assert_eq!(metadata["ontologyId"], "duo");
    assert!(!metadata.contains_key("_links"));

    let description = client.get_description("duo").await.expect("description");
    assert_eq!(description.as_deref(), Some("Tags datasets with use restrictions."));

    let ontologies = client.list_ontologies().await.expect("ontologies");
    assert_eq!(ontologies.len(), 1);
    assert_eq!(ontologies[0].id, "duo");
    assert_eq!(ontologies[0].title.as_deref(), Some("Data Use Ontology"));
}

#[test]
fn web_search_url_encodes_the_query() {
    assert_eq!(
        ols_client::user_search_url("heart valve"),
        "https://www.ebi.ac.uk/ols4/search?q=heart+valve"
    );
}
