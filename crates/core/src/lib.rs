//! Vigil core types: component identity, labels, deferred values, capabilities.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod capability;
mod value;

pub use capability::{
    Datasource, GrafanaDatasource, Notifier, PrometheusStore, RemoteEndpoints, ScrapeEndpoint,
    ScrapeTarget,
};
pub use value::{Resolver, Value};

/// Role a component plays in the stack. Drives the canonical label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Database,
    Dashboard,
    Notifier,
    Collector,
    Ingress,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Database => "database",
            ComponentKind::Dashboard => "dashboard",
            ComponentKind::Notifier => "notifier",
            ComponentKind::Collector => "collector",
            ComponentKind::Ingress => "ingress",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable component identity, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub kind: ComponentKind,
    pub name: String,
    pub namespace: String,
}

impl Identity {
    pub fn new(kind: ComponentKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { kind, name: name.into(), namespace: namespace.into() }
    }

    /// Canonical label set, a pure function of identity. Used both to tag
    /// resources and as the selector binding workload to service.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app.kubernetes.io/name".to_string(), self.kind.as_str().to_string()),
            ("app.kubernetes.io/instance".to_string(), self.name.clone()),
            ("app.kubernetes.io/component".to_string(), self.kind.as_str().to_string()),
        ])
    }
}

/// Construction-time misuse. Raised before any resource is declared, so a
/// component is never partially constructed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid replica count {0}: must be >= 1")]
    InvalidReplicas(i32),
    #[error("workload {0}: container list must not be empty")]
    NoContainers(String),
}

pub mod prelude {
    pub use super::{
        ComponentKind, Datasource, GrafanaDatasource, Identity, Notifier, PrometheusStore,
        RemoteEndpoints, Resolver, ScrapeEndpoint, ScrapeTarget, Value,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_a_pure_function_of_identity() {
        let a = Identity::new(ComponentKind::Database, "loki", "default");
        let b = Identity::new(ComponentKind::Database, "loki", "default");
        assert_eq!(a.labels(), b.labels());
        let l = a.labels();
        assert_eq!(l.get("app.kubernetes.io/name").map(String::as_str), Some("database"));
        assert_eq!(l.get("app.kubernetes.io/instance").map(String::as_str), Some("loki"));
        assert_eq!(l.get("app.kubernetes.io/component").map(String::as_str), Some("database"));
    }

    #[test]
    fn kinds_render_lowercase() {
        assert_eq!(ComponentKind::Ingress.to_string(), "ingress");
        assert_eq!(ComponentKind::Dashboard.as_str(), "dashboard");
    }
}
