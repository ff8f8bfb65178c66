//! Known OLS deployments and the uniform [`OntologyLookup`] interface over them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;

use crate::config::Settings;
use crate::error::OlsError;
use crate::sources::ols::{Hierarchy, LabelMap, OlsApi, OntologyMetadata, OntologySummary};
use crate::sources::pager::{DEFAULT_MAX_PAGES, PageShape};

/// EBI caps page sizes at 500.
pub const MAX_PAGE_SIZE: usize = 500;

/// Endpoint layout and response-shape conventions for one deployment.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub name: String,
    base_url: String,
    pub shape: PageShape,
    /// Embedded field holding term items.
    pub terms_field: String,
    /// Embedded field holding ontology records.
    pub ontologies_field: String,
    pub iri_field: String,
    pub label_field: String,
    /// Embedded parent IRIs (v2-style records).
    pub parent_field: String,
    /// Link relation walked for parents when `parent_field` is absent.
    pub parent_link: String,
    /// Path of the hierarchy listing; `{ontology}` is substituted.
    pub hierarchy_path: String,
    page_size: usize,
    pub max_pages: usize,
    pub page_delay: Option<Duration>,
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,
}

/// Trims trailing slashes and appends `/api` unless it is already there.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api")
    }
}

impl DeploymentConfig {
    pub fn new(name: impl Into<String>, base_url: &str) -> Self {
        Self {
            name: name.into(),
            base_url: normalize_base_url(base_url),
            shape: PageShape::default(),
            terms_field: "terms".to_string(),
            ontologies_field: "ontologies".to_string(),
            iri_field: "iri".to_string(),
            label_field: "label".to_string(),
            parent_field: "directParent".to_string(),
            parent_link: "parents".to_string(),
            hierarchy_path: "ontologies/{ontology}/terms".to_string(),
            page_size: MAX_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay: None,
            timeout: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Overrides the embedded field that holds term items.
    pub fn with_embedded_field(mut self, field: impl Into<String>) -> Self {
        self.terms_field = field.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Result<Self, OlsError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(OlsError::InvalidArgument(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}. Given: {page_size}"
            )));
        }
        self.page_size = page_size;
        Ok(self)
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request to this deployment.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, OlsError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| OlsError::InvalidArgument(format!("Invalid header name: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| OlsError::InvalidArgument(format!("Invalid header value: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Applies the base URL, embedded field, and page size from `settings`.
    pub fn apply_settings(mut self, settings: &Settings) -> Result<Self, OlsError> {
        if let Some(base_url) = settings.base_url.as_deref() {
            self = self.with_base_url(base_url);
        }
        if let Some(field) = settings.embedded_field.as_deref() {
            self = self.with_embedded_field(field);
        }
        if let Some(size) = settings.page_size {
            self = self.with_page_size(size)?;
        }
        Ok(self)
    }
}

/// A public OLS deployment with built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deployment {
    Ebi,
    Tib,
    ZbMed,
    Monarch,
    Fraunhofer,
}

impl Deployment {
    pub const ALL: [Deployment; 5] = [
        Deployment::Ebi,
        Deployment::Tib,
        Deployment::ZbMed,
        Deployment::Monarch,
        Deployment::Fraunhofer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ebi => "ebi",
            Self::Tib => "tib",
            Self::ZbMed => "zbmed",
            Self::Monarch => "monarch",
            Self::Fraunhofer => "fraunhofer",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Ebi => "EBI OLS4",
            Self::Tib => "TIB Terminology Service",
            Self::ZbMed => "ZB MED Semantic Lookup",
            Self::Monarch => "Monarch Initiative OLS",
            Self::Fraunhofer => "Fraunhofer SCAI OLS",
        }
    }

    pub fn default_base(self) -> &'static str {
        match self {
            Self::Ebi => "https://www.ebi.ac.uk/ols4",
            Self::Tib => "https://service.tib.eu/ts4tib",
            Self::ZbMed => "https://semanticlookup.zbmed.de/ols",
            Self::Monarch => "https://ols.monarchinitiative.org",
            // Not actively maintained upstream.
            Self::Fraunhofer => "https://rohan.scai.fraunhofer.de",
        }
    }

    /// Environment variable that overrides this deployment's root URL.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Ebi => "OLS_EBI_BASE",
            Self::Tib => "OLS_TIB_BASE",
            Self::ZbMed => "OLS_ZBMED_BASE",
            Self::Monarch => "OLS_MONARCH_BASE",
            Self::Fraunhofer => "OLS_FRAUNHOFER_BASE",
        }
    }

    pub(crate) fn min_request_interval(self) -> Duration {
        match self {
            Self::Ebi => Duration::from_millis(100),
            Self::Tib | Self::ZbMed => Duration::from_millis(200),
            Self::Monarch | Self::Fraunhofer => Duration::from_millis(250),
        }
    }

    pub fn config(self) -> DeploymentConfig {
        DeploymentConfig::new(
            self.name(),
            &crate::sources::env_base(self.default_base(), self.env_var()),
        )
    }

    /// Builds the concrete client for this deployment around `config` and `client`.
    pub fn client_with(
        self,
        config: DeploymentConfig,
        client: ClientWithMiddleware,
    ) -> Box<dyn OntologyLookup> {
        let api = OlsApi::with_client(config, client);
        match self {
            Self::Ebi => Box::new(EbiClient { api }),
            Self::Tib => Box::new(TibClient { api }),
            Self::ZbMed => Box::new(ZbMedClient { api }),
            Self::Monarch => Box::new(MonarchClient { api }),
            Self::Fraunhofer => Box::new(FraunhoferClient { api }),
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Deployment {
    type Err = OlsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ebi" | "ols" | "ols4" => Ok(Self::Ebi),
            "tib" | "ts4tib" => Ok(Self::Tib),
            "zbmed" | "zb-med" | "zb_med" => Ok(Self::ZbMed),
            "monarch" => Ok(Self::Monarch),
            "fraunhofer" | "scai" => Ok(Self::Fraunhofer),
            other => Err(OlsError::InvalidArgument(format!(
                "Unknown deployment '{other}'. \
                 Expected one of: ebi, tib, zbmed, monarch, fraunhofer"
            ))),
        }
    }
}

/// Read operations every OLS deployment supports.
///
/// Implementors only supply [`OntologyLookup::api`]; pagination and aggregation are shared.
#[async_trait]
pub trait OntologyLookup: Send + Sync {
    fn api(&self) -> &OlsApi;

    fn name(&self) -> &str {
        &self.api().config().name
    }

    async fn list_ontologies(&self) -> Result<Vec<OntologySummary>, OlsError> {
        self.api().list_ontologies().await
    }

    async fn get_metadata(&self, ontology: &str) -> Result<OntologyMetadata, OlsError> {
        self.api().get_metadata(ontology).await
    }

    async fn get_labels(&self, ontology: &str) -> Result<LabelMap, OlsError> {
        self.api().get_labels(ontology).await
    }

    async fn get_hierarchy(&self, ontology: &str) -> Result<Hierarchy, OlsError> {
        self.api().get_hierarchy(ontology).await
    }

    async fn get_description(&self, ontology: &str) -> Result<Option<String>, OlsError> {
        self.api().get_description(ontology).await
    }

    async fn get_term(&self, ontology: &str, iri: &str) -> Result<Value, OlsError> {
        self.api().get_term(ontology, iri).await
    }

    async fn search(&self, query: &str, fields: &[String]) -> Result<Vec<Value>, OlsError> {
        self.api().search(query, fields).await
    }

    async fn suggest(&self, query: &str, ontologies: &[String]) -> Result<Value, OlsError> {
        self.api().suggest(query, ontologies).await
    }

    async fn ancestor_labels(
        &self,
        ontology: &str,
        iri: &str,
        hierarchical: bool,
    ) -> Result<Vec<String>, OlsError> {
        self.api().ancestor_labels(ontology, iri, hierarchical).await
    }

    async fn hierarchy_label_edges(
        &self,
        ontology: &str,
    ) -> Result<Vec<(String, String)>, OlsError> {
        self.api().hierarchy_label_edges(ontology).await
    }

    async fn get_embedding(&self, ontology: &str, iri: &str) -> Result<Vec<f64>, OlsError> {
        self.api().get_embedding(ontology, iri).await
    }

    fn iter_terms(
        &self,
        ontology: &str,
    ) -> Result<BoxStream<'static, Result<Value, OlsError>>, OlsError> {
        self.api().iter_terms(ontology)
    }
}

/// The first-party EBI deployment (<https://www.ebi.ac.uk/ols4>).
pub struct EbiClient {
    api: OlsApi,
}

impl EbiClient {
    pub fn new() -> Result<Self, OlsError> {
        Self::with_config(Deployment::Ebi.config())
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }
}

impl OntologyLookup for EbiClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

/// TIB Leibniz Information Centre terminology service (<https://service.tib.eu/ts4tib>).
pub struct TibClient {
    api: OlsApi,
}

impl TibClient {
    pub fn new() -> Result<Self, OlsError> {
        Self::with_config(Deployment::Tib.config())
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }
}

impl OntologyLookup for TibClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

/// ZB MED semantic lookup (<https://semanticlookup.zbmed.de/ols>).
pub struct ZbMedClient {
    api: OlsApi,
}

impl ZbMedClient {
    pub fn new() -> Result<Self, OlsError> {
        Self::with_config(Deployment::ZbMed.config())
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }
}

impl OntologyLookup for ZbMedClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

pub struct MonarchClient {
    api: OlsApi,
}

impl MonarchClient {
    pub fn new() -> Result<Self, OlsError> {
        Self::with_config(Deployment::Monarch.config())
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }
}

impl OntologyLookup for MonarchClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

pub struct FraunhoferClient {
    api: OlsApi,
}

impl FraunhoferClient {
    pub fn new() -> Result<Self, OlsError> {
        Self::with_config(Deployment::Fraunhofer.config())
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }
}

impl OntologyLookup for FraunhoferClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

/// Any other OLS-compatible deployment, addressed by base URL.
pub struct CustomClient {
    api: OlsApi,
}

impl CustomClient {
    pub fn new(base_url: &str) -> Result<Self, OlsError> {
        Self::with_config(DeploymentConfig::new("custom", base_url))
    }

    pub fn with_config(config: DeploymentConfig) -> Result<Self, OlsError> {
        Ok(Self {
            api: OlsApi::new(config)?,
        })
    }

    pub fn with_client(config: DeploymentConfig, client: ClientWithMiddleware) -> Self {
        Self {
            api: OlsApi::with_client(config, client),
        }
    }
}

impl OntologyLookup for CustomClient {
    fn api(&self) -> &OlsApi {
        &self.api
    }
}

/// Looks up a named deployment and builds its client with default settings.
pub fn resolve_client(name: &str) -> Result<Box<dyn OntologyLookup>, OlsError> {
    let deployment: Deployment = name.parse()?;
    Ok(deployment.client_with(deployment.config(), crate::sources::shared_client()?))
}

/// Builds a fresh client from layered [`Settings`].
///
/// A `base_url` without a named deployment yields a [`CustomClient`]; otherwise the
/// named (or EBI) deployment is used with the overrides applied.
pub fn client_from_settings(settings: &Settings) -> Result<Box<dyn OntologyLookup>, OlsError> {
    let http = match settings.cache_dir.as_deref() {
        Some(dir) => crate::sources::build_client(dir)?,
        None => crate::sources::shared_client()?,
    };

    match settings.deployment.as_deref() {
        None if settings.base_url.is_some() => {
            let config = DeploymentConfig::new("custom", "").apply_settings(settings)?;
            Ok(Box::new(CustomClient::with_client(config, http)))
        }
        name => {
            let deployment = match name {
                Some(name) => name.parse()?,
                None => Deployment::Ebi,
            };
            let config = deployment.config().apply_settings(settings)?;
            Ok(deployment.client_with(config, http))
        }
    }
}
