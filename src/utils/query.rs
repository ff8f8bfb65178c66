use reqwest::Url;

const EBI_SEARCH_URL: &str = "https://www.ebi.ac.uk/ols4/search";

/// Encodes an IRI for use as a single OLS path segment.
///
/// OLS expects term IRIs in paths to be percent-encoded twice.
pub(crate) fn encode_iri_segment(iri: &str) -> String {
    urlencoding::encode(&urlencoding::encode(iri)).into_owned()
}

/// Link to the EBI web search for a name the caller could not resolve.
pub fn user_search_url(name: &str) -> String {
    match Url::parse_with_params(EBI_SEARCH_URL, &[("q", name.trim())]) {
        Ok(url) => url.into(),
        Err(_) => EBI_SEARCH_URL.to_string(),
    }
}
