//! Readiness probes.
//!
//! The readiness report is the AND of every registered probe. An empty probe
//! set is ready.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A dependency the service needs before it should receive traffic.
pub trait ReadinessProbe: Send + Sync {
    /// Key under `services` in the readiness report.
    fn name(&self) -> &str;

    fn check(&self) -> BoxFuture<'_, bool>;
}

/// Probe reporting a fixed status.
///
/// Stands in for dependencies whose clients live outside this service.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    name: String,
    ready: bool,
}

impl StaticProbe {
    pub fn new(name: impl Into<String>, ready: bool) -> Self {
        Self {
            name: name.into(),
            ready,
        }
    }
}

impl ReadinessProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, bool> {
        let ready = self.ready;
        Box::pin(async move { ready })
    }
}

/// Body of `GET /health/ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReadinessReport {
    pub ready: bool,
    pub services: BTreeMap<String, bool>,
}

/// Registered probes.
#[derive(Clone, Default)]
pub struct Readiness {
    probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(mut self, probe: impl ReadinessProbe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// `database` and `redis`, both always ready.
    pub fn placeholder() -> Self {
        Self::new()
            .with_probe(StaticProbe::new("database", true))
            .with_probe(StaticProbe::new("redis", true))
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Run every probe concurrently.
    pub async fn evaluate(&self) -> ReadinessReport {
        let results = join_all(self.probes.iter().map(|probe| async move {
            (probe.name().to_string(), probe.check().await)
        }))
        .await;

        let ready = results.iter().all(|(_, status)| *status);
        for (name, status) in results.iter().filter(|(_, status)| !*status) {
            tracing::warn!(service = %name, ready = status, "Readiness probe failed");
        }

        ReadinessReport {
            ready,
            services: results.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.probes.iter().map(|probe| probe.name()))
            .finish()
    }
}
