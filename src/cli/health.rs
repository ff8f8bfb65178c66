use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::error::OlsError;
use crate::sources::deployment::Deployment;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub deployment: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# OLS Deployment Health\n\n");
        out.push_str("| Deployment | Status | Latency |\n");
        out.push_str("|------------|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.deployment, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

async fn probe(client: reqwest::Client, label: String, url: String) -> HealthRow {
    let start = Instant::now();
    let resp = client
        .get(&url)
        .query(&[("size", "1")])
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;

    let elapsed = start.elapsed().as_millis();
    match resp {
        Ok(resp) if resp.status().is_success() => HealthRow {
            deployment: label,
            status: "ok".into(),
            latency: format!("{elapsed}ms"),
        },
        Ok(resp) => HealthRow {
            deployment: label,
            status: "error".into(),
            latency: format!("{elapsed}ms (HTTP {})", resp.status().as_u16()),
        },
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            HealthRow {
                deployment: label,
                status: "error".into(),
                latency: reason.into(),
            }
        }
    }
}

fn health_http_client() -> Result<reqwest::Client, OlsError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    // Bypasses the cache so a probe always reaches the deployment.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("ols-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(OlsError::HttpClientInit)?;

    let _ = HEALTH_HTTP_CLIENT.set(client.clone());
    Ok(client)
}

async fn check_cache_dir(dir: &Path) -> HealthRow {
    let start = Instant::now();
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let probe = dir.join(format!(".ols-healthcheck-{suffix}.tmp"));

    let result = (|| -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(&probe, b"ok")?;
        match std::fs::remove_file(&probe) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    })();

    let label = format!("Cache dir ({})", dir.display());
    match result {
        Ok(()) => HealthRow {
            deployment: label,
            status: "ok".into(),
            latency: format!("{}ms", start.elapsed().as_millis()),
        },
        Err(err) => HealthRow {
            deployment: label,
            status: "error".into(),
            latency: format!("{:?}", err.kind()),
        },
    }
}

/// Probes `ontologies?size=1` on every known deployment, then the cache directory.
///
/// # Errors
///
/// Returns an error when the probe HTTP client cannot be created.
pub async fn check(cache_dir: Option<&Path>) -> Result<HealthReport, OlsError> {
    let client = health_http_client()?;

    let probes = Deployment::ALL.iter().map(|deployment| {
        let config = deployment.config();
        let url = format!("{}/ontologies", config.base_url());
        probe(
            client.clone(),
            format!("{} ({})", deployment.title(), deployment.name()),
            url,
        )
    });
    let mut rows = join_all(probes).await;

    if let Some(dir) = cache_dir {
        rows.push(check_cache_dir(dir).await);
    }
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ontologies"))
            .and(query_param("size", "1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let row = probe(
            reqwest::Client::new(),
            "mirror".into(),
            format!("{}/api/ontologies", server.uri()),
        )
        .await;
        assert_eq!(row.status, "error");
        assert!(row.latency.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn cache_dir_check_writes_probe_file() {
        let dir = std::env::temp_dir().join(format!("ols-health-test-{}", std::process::id()));
        let row = check_cache_dir(&dir).await;
        assert_eq!(row.status, "ok");
        assert!(row.deployment.starts_with("Cache dir ("));
    }

    #[test]
    fn markdown_summarizes_health() {
        let report = HealthReport {
            healthy: 1,
            total: 2,
            rows: vec![
                HealthRow {
                    deployment: "EBI OLS4 (ebi)".into(),
                    status: "ok".into(),
                    latency: "12ms".into(),
                },
                HealthRow {
                    deployment: "Fraunhofer SCAI OLS (fraunhofer)".into(),
                    status: "error".into(),
                    latency: "timeout".into(),
                },
            ],
        };
        assert!(!report.all_healthy());
        let md = report.to_markdown();
        assert!(md.contains("| EBI OLS4 (ebi) | ok | 12ms |"));
        assert!(md.contains("Status: 1/2 healthy"));
    }
}
