//! Server-side apply of a recorded manifest set.
//!
//! One SSA patch per declared resource, in declaration order, with the field
//! manager `vigil`. Reconciliation failures are not retried or translated
//! here; the first error aborts the walk and propagates to the caller.

use anyhow::{anyhow, Context, Result};
use kube::{
    api::{Api, Patch, PatchParams},
    core::{DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::{AnyResource, ManifestSet};

pub const FIELD_MANAGER: &str = "vigil";

/// Per-resource result of an apply walk.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApplyOutcome {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub dry_run: bool,
    pub new_rv: Option<String>,
}

fn gvk_of(res: &AnyResource) -> GroupVersionKind {
    let (group, version) = match res.api_version.split_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), res.api_version.clone()),
    };
    GroupVersionKind { group, version, kind: res.kind.clone() }
}

fn find_api_resource(
    discovery: &Discovery,
    gvk: &GroupVersionKind,
) -> Result<(kube::core::ApiResource, bool)> {
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
}

/// Apply every recorded resource via SSA. With `dry_run` the server validates
/// each patch without persisting it.
pub async fn apply_all(set: &ManifestSet, dry_run: bool) -> Result<Vec<ApplyOutcome>> {
    let t0 = std::time::Instant::now();
    counter!("apply_attempts", 1u64);

    let client = Client::try_default().await.context("building kube client")?;
    let discovery = Discovery::new(client.clone()).run().await.context("API discovery")?;

    let mut outcomes = Vec::new();
    for res in set.resources() {
        let gvk = gvk_of(&res);
        let (ar, namespaced) = find_api_resource(&discovery, &gvk)?;
        let api: Api<DynamicObject> = if namespaced {
            match res.namespace.as_deref() {
                Some(ns) => Api::namespaced_with(client.clone(), ns, &ar),
                None => return Err(anyhow!("{} {}: namespace required", res.kind, res.name)),
            }
        } else {
            Api::all_with(client.clone(), &ar)
        };

        let pp = if dry_run {
            PatchParams::apply(FIELD_MANAGER).dry_run()
        } else {
            PatchParams::apply(FIELD_MANAGER)
        };
        let obj = match api.patch(&res.name, &pp, &Patch::Apply(&res.manifest)).await {
            Ok(o) => o,
            Err(e) => {
                counter!("apply_err", 1u64);
                warn!(kind = %res.kind, name = %res.name, error = %e, "apply failed");
                return Err(anyhow!("applying {} {}: {}", res.kind, res.name, e));
            }
        };
        info!(kind = %res.kind, name = %res.name, dry_run, "applied");
        outcomes.push(ApplyOutcome {
            kind: res.kind.clone(),
            name: res.name.clone(),
            namespace: res.namespace.clone(),
            dry_run,
            new_rv: obj.metadata.resource_version,
        });
    }

    histogram!("apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
    counter!("apply_ok", 1u64);
    Ok(outcomes)
}
