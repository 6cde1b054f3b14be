//! Vigil platform boundary.
//!
//! Components hand their child resources to a [`Declarer`] and get back a
//! handle whose fields resolve once the engine realizes the resource. The
//! in-process engine here is [`ManifestSet`]: it records declarations in
//! order, resolves handles from the declared specs, and renders the set as
//! multi-document YAML. The server-side apply path over that set lives in
//! [`apply`].

#![forbid(unsafe_code)]

use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use vigil_core::Value;

pub mod apply;

/// A declared resource: kind coordinates plus the full manifest. The manifest
/// is the typed `k8s-openapi` spec serialized verbatim (apiVersion/kind
/// included).
#[derive(Debug, Clone, Serialize)]
pub struct AnyResource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub manifest: serde_json::Value,
}

impl AnyResource {
    /// Capture a typed resource. Requires `metadata.name` to be set; this
    /// layer never asks the server to generate names.
    pub fn from_resource<K>(obj: &K) -> Result<Self>
    where
        K: k8s_openapi::Resource + Serialize,
    {
        let manifest = serde_json::to_value(obj).context("serializing resource")?;
        let name = manifest
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("{} resource missing metadata.name", K::KIND))?
            .to_string();
        let namespace = manifest
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(Self {
            api_version: K::API_VERSION.to_string(),
            kind: K::KIND.to_string(),
            name,
            namespace,
            manifest,
        })
    }
}

/// Read side of a declaration: generated identifiers, deferred until the
/// engine realizes the resource.
#[derive(Debug, Clone)]
pub struct DeclaredHandle {
    pub name: Value<String>,
    pub namespace: Value<String>,
}

/// The single operation this layer asks of the orchestration platform:
/// declare a resource, get back a handle of deferred identifiers. Failures in
/// later reconciliation are the platform's to surface, not this trait's.
pub trait Declarer {
    fn declare(&self, resource: AnyResource) -> Result<DeclaredHandle>;
}

/// Recording declarer. Declaration order is preserved; rendering the same
/// component graph twice yields byte-identical output.
#[derive(Debug, Default)]
pub struct ManifestSet {
    recorded: Mutex<Vec<AnyResource>>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything declared so far, in declaration order.
    pub fn resources(&self) -> Vec<AnyResource> {
        self.recorded.lock().expect("manifest set poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().expect("manifest set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as a single multi-document YAML stream.
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for res in self.resources() {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&res.manifest).context("rendering manifest")?);
        }
        Ok(out)
    }
}

impl Declarer for ManifestSet {
    fn declare(&self, resource: AnyResource) -> Result<DeclaredHandle> {
        if resource.name.is_empty() {
            return Err(anyhow!("{}: empty metadata.name", resource.kind));
        }
        let (name, resolve_name) = Value::deferred();
        let (namespace, resolve_ns) = Value::deferred();
        // Names are deterministic for this engine, so the handle resolves at
        // declaration time. Readers must not rely on that: a reconciling
        // engine resolves later, and `Value::get` semantics are identical.
        resolve_name.resolve(resource.name.clone());
        resolve_ns.resolve(resource.namespace.clone().unwrap_or_default());
        self.recorded.lock().expect("manifest set poisoned").push(resource);
        Ok(DeclaredHandle { name, namespace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn cm(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            data: Some([("k".to_string(), "v".to_string())].into()),
            ..Default::default()
        }
    }

    #[test]
    fn from_resource_captures_coordinates() {
        let r = AnyResource::from_resource(&cm("demo")).unwrap();
        assert_eq!(r.api_version, "v1");
        assert_eq!(r.kind, "ConfigMap");
        assert_eq!(r.name, "demo");
        assert_eq!(r.namespace.as_deref(), Some("default"));
        assert_eq!(r.manifest["kind"], "ConfigMap");
    }

    #[test]
    fn from_resource_rejects_missing_name() {
        let anon = ConfigMap::default();
        let err = AnyResource::from_resource(&anon).unwrap_err().to_string();
        assert!(err.contains("missing metadata.name"), "err={}", err);
    }

    #[test]
    fn declare_resolves_handle_fields() {
        let set = ManifestSet::new();
        let h = set.declare(AnyResource::from_resource(&cm("demo")).unwrap()).unwrap();
        assert_eq!(h.name.get().as_deref(), Some("demo"));
        assert_eq!(h.namespace.get().as_deref(), Some("default"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn render_preserves_declaration_order() {
        let set = ManifestSet::new();
        for n in ["a", "b", "c"] {
            set.declare(AnyResource::from_resource(&cm(n)).unwrap()).unwrap();
        }
        let yaml = set.to_yaml().unwrap();
        let a = yaml.find("name: a").unwrap();
        let b = yaml.find("name: b").unwrap();
        let c = yaml.find("name: c").unwrap();
        assert!(a < b && b < c, "declaration order not preserved:\n{}", yaml);
        assert_eq!(yaml.matches("---\n").count(), 3);
    }
}
