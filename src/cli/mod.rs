use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures::TryStreamExt;

use crate::config::Settings;
use crate::entities::ontology::{count_terms, hierarchy_edges};
use crate::render;
use crate::sources::deployment::client_from_settings;
use crate::sources::with_no_cache;

pub mod health;

#[derive(Parser, Debug)]
#[command(name = "ols")]
#[command(
    author,
    version,
    about = "Query Ontology Lookup Service deployments for labels, hierarchies and metadata"
)]
pub struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Named deployment (ebi, tib, zbmed, monarch, fraunhofer)
    #[arg(short, long, global = true)]
    pub deployment: Option<String>,

    /// Custom deployment root URL (`/api` is appended when missing)
    #[arg(short, long, global = true)]
    pub base_url: Option<String>,

    /// Embedded field that holds term items in paged responses
    #[arg(long, global = true)]
    pub embedded_field: Option<String>,

    /// Directory for the HTTP response cache
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Items requested per page (1-500)
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Bypass the HTTP response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Lookup(LookupCommand),
    /// Probe every known deployment and the cache directory
    Health,
}

/// Commands answered by the configured deployment.
#[derive(Subcommand, Debug)]
pub enum LookupCommand {
    /// Print the label of every term in an ontology
    Labels {
        /// Ontology identifier (e.g. chebi)
        ontology: String,
        /// Prefix each label with its IRI
        #[arg(long)]
        with_iri: bool,
    },
    /// Print child/parent edges of an ontology's term hierarchy
    Hierarchy {
        /// Ontology identifier (e.g. go)
        ontology: String,
        /// Print label pairs walked from hierarchical children instead of IRIs
        #[arg(long)]
        labels: bool,
    },
    /// Show an ontology's metadata record
    Metadata {
        /// Ontology identifier
        ontology: String,
    },
    /// Show an ontology's description
    Description {
        /// Ontology identifier
        ontology: String,
    },
    /// List ontologies served by the deployment
    Ontologies,
    /// Count the terms of an ontology by walking every page
    Count {
        /// Ontology identifier
        ontology: String,
    },
    /// Fetch a single term record
    Term {
        /// Ontology identifier
        ontology: String,
        /// Term IRI
        #[arg(long)]
        iri: String,
    },
    /// Print the labels of a term's ancestors
    Ancestors {
        /// Ontology identifier
        ontology: String,
        /// Term IRI
        #[arg(long)]
        iri: String,
        /// Follow hierarchical (part-of aware) ancestors
        #[arg(long)]
        hierarchical: bool,
    },
    /// Print a term's LLM embedding vector
    Embedding {
        /// Ontology identifier
        ontology: String,
        /// Term IRI
        #[arg(long)]
        iri: String,
    },
    /// Dump every raw term record as JSON lines
    Terms {
        /// Ontology identifier
        ontology: String,
    },
    /// Full-text search across the deployment
    Search {
        /// Query text
        query: String,
        /// Restrict matching to these fields (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Autocomplete suggestions for a partial query
    Suggest {
        /// Partial query text
        query: String,
        /// Restrict suggestions to these ontologies (repeatable)
        #[arg(long = "ontology")]
        ontologies: Vec<String>,
    },
}

/// Rendered command output and whether the process should exit successfully.
#[derive(Debug)]
pub struct Outcome {
    pub output: String,
    pub success: bool,
}

impl Outcome {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Settings {
        Settings {
            deployment: self.deployment.clone(),
            base_url: self.base_url.clone(),
            embedded_field: self.embedded_field.clone(),
            cache_dir: self.cache_dir.clone(),
            page_size: self.page_size,
        }
    }
}

/// Executes a parsed command line and returns the rendered output.
///
/// # Errors
///
/// Returns an error when settings cannot be loaded, a client cannot be built,
/// or the underlying lookup fails.
pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let settings = Settings::load()?.merge(cli.overrides());
    let no_cache = cli.no_cache;
    with_no_cache(no_cache, execute(cli, settings)).await
}

/// Unhealthy deployments still print the report but fail the process.
fn health_outcome(report: &health::HealthReport, json: bool) -> anyhow::Result<Outcome> {
    let output = if json {
        render::json::to_pretty(report)?
    } else {
        report.to_markdown()
    };
    Ok(Outcome {
        output,
        success: report.all_healthy(),
    })
}

async fn execute(cli: Cli, settings: Settings) -> anyhow::Result<Outcome> {
    let json = cli.json;
    match cli.command {
        // Runs without resolving the configured deployment.
        Commands::Health => {
            let cache_dir = settings.cache_dir();
            let report = health::check(Some(&cache_dir)).await?;
            health_outcome(&report, json)
        }
        Commands::Lookup(command) => lookup(command, &settings, json).await.map(Outcome::ok),
    }
}

async fn lookup(command: LookupCommand, settings: &Settings, json: bool) -> anyhow::Result<String> {
    let client = client_from_settings(settings)?;
    tracing::debug!(deployment = client.name(), "resolved deployment");

    let output = match command {
        LookupCommand::Labels { ontology, with_iri } => {
            let labels = client.get_labels(&ontology).await?;
            if json {
                render::json::to_pretty(&labels)?
            } else {
                render::text::labels(&labels, with_iri)
            }
        }
        LookupCommand::Hierarchy { ontology, labels } => {
            if labels {
                let edges = client.hierarchy_label_edges(&ontology).await?;
                if json {
                    render::json::to_pretty(&edges)?
                } else {
                    render::text::pairs(&edges)
                }
            } else {
                let hierarchy = client.get_hierarchy(&ontology).await?;
                if json {
                    render::json::to_pretty(&hierarchy)?
                } else {
                    render::text::hierarchy(&hierarchy_edges(&hierarchy))
                }
            }
        }
        LookupCommand::Metadata { ontology } => {
            let metadata = client.get_metadata(&ontology).await?;
            if json {
                render::json::to_pretty(&metadata)?
            } else {
                render::markdown::metadata_markdown(&ontology, &metadata)?
            }
        }
        LookupCommand::Description { ontology } => {
            let description = client.get_description(&ontology).await?;
            if json {
                render::json::to_pretty(&description)?
            } else {
                description.unwrap_or_else(|| format!("No description for {ontology}."))
            }
        }
        LookupCommand::Ontologies => {
            let rows = client.list_ontologies().await?;
            if json {
                render::json::to_pretty(&rows)?
            } else {
                render::markdown::ontologies_markdown(client.name(), &rows)?
            }
        }
        LookupCommand::Count { ontology } => {
            let count = count_terms(client.as_ref(), &ontology).await?;
            if json {
                render::json::to_pretty(&serde_json::json!({
                    "ontology": ontology,
                    "terms": count,
                }))?
            } else {
                count.to_string()
            }
        }
        LookupCommand::Term { ontology, iri } => {
            let term = client.get_term(&ontology, &iri).await?;
            render::json::to_pretty(&term)?
        }
        LookupCommand::Ancestors {
            ontology,
            iri,
            hierarchical,
        } => {
            let labels = client.ancestor_labels(&ontology, &iri, hierarchical).await?;
            if json {
                render::json::to_pretty(&labels)?
            } else {
                render::text::lines(&labels)
            }
        }
        LookupCommand::Embedding { ontology, iri } => {
            let vector = client.get_embedding(&ontology, &iri).await?;
            render::json::to_pretty(&vector)?
        }
        LookupCommand::Terms { ontology } => {
            let terms: Vec<serde_json::Value> = client.iter_terms(&ontology)?.try_collect().await?;
            if json {
                render::json::to_pretty(&terms)?
            } else {
                terms
                    .iter()
                    .map(serde_json::Value::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        LookupCommand::Search { query, fields } => {
            let docs = client.search(&query, &fields).await?;
            if json {
                render::json::to_pretty(&docs)?
            } else {
                render::markdown::search_markdown(&query, &docs)?
            }
        }
        LookupCommand::Suggest { query, ontologies } => {
            let response = client.suggest(&query, &ontologies).await?;
            render::json::to_pretty(&response)?
        }
    };
    Ok(output)
}
