use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::Extensions;
use reqwest::Url;
use reqwest_middleware::{Middleware, Next};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

use crate::sources::deployment::Deployment;

/// Minimum spacing between requests whose URL starts with `prefix`.
#[derive(Clone, Debug)]
pub(crate) struct HostBudget {
    pub name: &'static str,
    pub prefix: Cow<'static, str>,
    pub min_interval: Duration,
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    budgets: Vec<HostBudget>,
    fallback_interval: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// One budget per known deployment, honoring `OLS_<NAME>_BASE` overrides.
    pub(crate) fn for_known_deployments() -> Self {
        let budgets = Deployment::ALL
            .iter()
            .map(|deployment| HostBudget {
                name: deployment.name(),
                prefix: crate::sources::env_base(deployment.default_base(), deployment.env_var()),
                min_interval: deployment.min_request_interval(),
            })
            .collect();
        Self::new(budgets, Duration::from_millis(50))
    }

    pub(crate) fn new(budgets: Vec<HostBudget>, fallback_interval: Duration) -> Self {
        Self {
            budgets,
            fallback_interval,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    fn budget_for(&self, url: &Url) -> (String, Duration) {
        let full = url.as_str();

        // Mirrors can share a host, so the longest configured prefix decides.
        if let Some(budget) = self
            .budgets
            .iter()
            .filter(|b| full.starts_with(b.prefix.as_ref()))
            .max_by_key(|b| b.prefix.len())
        {
            return (format!("deployment:{}", budget.name), budget.min_interval);
        }

        let origin = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or("unknown-host")
        );
        (format!("host:{origin}"), self.fallback_interval)
    }

    pub(crate) async fn wait_for_turn(&self, url: &Url) {
        let (key, min_interval) = self.budget_for(url);
        loop {
            let now = Instant::now();
            let mut last_request = self.last_request.lock().await;
            let ready_at = last_request.get(&key).map(|last| *last + min_interval);

            match ready_at {
                Some(target) if target > now => {
                    drop(last_request);
                    sleep_until(target).await;
                }
                _ => {
                    last_request.insert(key, now);
                    return;
                }
            }
        }
    }
}

static RATE_LIMITER: OnceLock<Arc<RateLimiter>> = OnceLock::new();

#[derive(Clone, Debug)]
pub(crate) struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub(crate) fn new() -> Self {
        Self {
            limiter: RATE_LIMITER
                .get_or_init(|| Arc::new(RateLimiter::for_known_deployments()))
                .clone(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.limiter.wait_for_turn(req.url()).await;
        next.run(req, extensions).await
    }
}
