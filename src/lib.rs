#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

//! Client for Ontology Lookup Service (OLS) deployments.
//!
//! The free functions below talk to the deployment chosen by the layered
//! [`Settings`]; use [`resolve_client`] or the `*Client` types to pick one
//! explicitly.

pub mod cli;
pub mod config;
pub mod error;
pub mod sources;

mod entities;
mod render;
mod utils;

pub use config::Settings;
pub use entities::ontology::{
    HierarchyEdge, count_terms, default_client, get_description, get_hierarchy, get_labels,
    get_metadata, hierarchy_edges, list_ontologies,
};
pub use error::OlsError;
pub use sources::deployment::{
    CustomClient, Deployment, DeploymentConfig, EbiClient, FraunhoferClient, MonarchClient,
    OntologyLookup, TibClient, ZbMedClient, client_from_settings, resolve_client,
};
pub use sources::ols::{Hierarchy, LabelMap, OntologyMetadata, OntologySummary};
pub use sources::pager::{PageShape, Pager};
pub use sources::transport::Transport;
pub use sources::with_no_cache;
pub use utils::query::user_search_url;
