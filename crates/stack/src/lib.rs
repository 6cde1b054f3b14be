//! Vigil concrete components.
//!
//! Each component follows the same three-step protocol: build its owned
//! config documents, declare exactly one workload plus the service(s)
//! exposing its ports, then compute its capability values from the declared
//! handles and from the capability-typed arguments it was constructed with.
//! Dependency wiring is caller-provided; the composition script constructs
//! components in dependency order and passes them along.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use vigil_core::{Identity, Value};
use vigil_platform::{AnyResource, DeclaredHandle, Declarer};

mod alertmanager;
mod grafana;
mod ini;
mod loki;
mod nginx;
mod tempo;
mod victoria;
mod vmalert;

pub use alertmanager::Alertmanager;
pub use grafana::Grafana;
pub use loki::Loki;
pub use nginx::Nginx;
pub use tempo::Tempo;
pub use victoria::Victoria;
pub use vmalert::VmAlert;

/// Inline defaults shared by every component the composition script builds.
#[derive(Debug, Clone)]
pub struct StackOpts {
    pub namespace: String,
    /// Image tag applied to every component image.
    pub tag: String,
}

impl Default for StackOpts {
    fn default() -> Self {
        Self { namespace: "default".to_string(), tag: "latest".to_string() }
    }
}

fn metadata(identity: &Identity) -> ObjectMeta {
    ObjectMeta {
        name: Some(identity.name.clone()),
        namespace: Some(identity.namespace.clone()),
        labels: Some(identity.labels()),
        ..Default::default()
    }
}

/// Declare the component's ConfigMap holding its config documents.
fn config_map(
    declarer: &dyn Declarer,
    identity: &Identity,
    data: BTreeMap<String, String>,
) -> Result<DeclaredHandle> {
    let cm = ConfigMap { metadata: metadata(identity), data: Some(data), ..Default::default() };
    declarer.declare(AnyResource::from_resource(&cm)?)
}

/// Declare the component's Service under its own name.
fn service(
    declarer: &dyn Declarer,
    identity: &Identity,
    selector: &BTreeMap<String, String>,
    ports: Vec<ServicePort>,
) -> Result<DeclaredHandle> {
    let svc = Service {
        metadata: metadata(identity),
        spec: Some(ServiceSpec {
            ports: Some(ports),
            selector: Some(selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    };
    declarer.declare(AnyResource::from_resource(&svc)?)
}

/// Cluster-internal URL of a declared service on a fixed port.
fn service_url(handle: &DeclaredHandle, port: i32) -> Value<String> {
    handle
        .name
        .zip(&handle.namespace)
        .map(move |(name, ns)| format!("http://{name}.{ns}:{port}"))
}

/// Render a settings tree as YAML for a mounted config document.
fn yaml_doc(value: &serde_json::Value) -> Result<String> {
    serde_yaml::to_string(value).context("rendering config document")
}
