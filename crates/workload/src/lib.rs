//! Vigil workload templates.
//!
//! Every concrete component runs as one of two standard workload shapes:
//!
//! - [`stateless`]: a Deployment with rolling replacement.
//! - [`stateful`]: a StatefulSet plus a headless discovery Service, so each
//!   replica gets an individually addressable name.
//!
//! Both bind a restricted ServiceAccount (auto-provisioned when none is
//! given) and apply a preferred, weight-1 anti-affinity hint spreading
//! replicas across hosts. Argument validation happens before the first
//! declaration, so an invalid workload never partially constructs.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::Result;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, StatefulSet, StatefulSetSpec,
    StatefulSetUpdateStrategy,
};
use k8s_openapi::api::core::v1::{
    Affinity, Container, PodAffinityTerm, PodAntiAffinity, PodSpec, PodTemplateSpec, Service,
    ServiceAccount, ServiceSpec, Volume, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use vigil_core::{Error, Value};
use vigil_platform::{AnyResource, Declarer};

/// Arguments shared by both templates.
#[derive(Debug, Clone, Default)]
pub struct WorkloadArgs {
    pub name: String,
    pub namespace: String,
    /// Labels applied to every emitted resource.
    pub labels: BTreeMap<String, String>,
    /// Selector binding pods to the workload (and services to pods).
    pub selector: BTreeMap<String, String>,
    pub containers: Vec<Container>,
    /// `None` defaults to 1; an explicit value below 1 is rejected.
    pub replicas: Option<i32>,
    pub volumes: Vec<Volume>,
    /// Existing service account to bind; when absent a restricted one is
    /// created under the workload's name.
    pub service_account: Option<String>,
}

/// Generated identifiers of a declared workload.
#[derive(Debug, Clone)]
pub struct WorkloadHandle {
    pub name: Value<String>,
    pub namespace: Value<String>,
    pub selector: BTreeMap<String, String>,
    /// Stable per-replica addresses, `<name>-<i>.<discovery-service>`.
    /// Empty for stateless workloads, which have no stable identity.
    pub replica_addresses: Vec<Value<String>>,
}

fn effective_replicas(args: &WorkloadArgs) -> Result<i32> {
    match args.replicas {
        None => Ok(1),
        Some(n) if n >= 1 => Ok(n),
        Some(n) => Err(Error::InvalidReplicas(n).into()),
    }
}

fn validate(args: &WorkloadArgs) -> Result<i32> {
    if args.containers.is_empty() {
        return Err(Error::NoContainers(args.name.clone()).into());
    }
    effective_replicas(args)
}

fn metadata(name: &str, args: &WorkloadArgs) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(args.namespace.clone()),
        labels: Some(args.labels.clone()),
        ..Default::default()
    }
}

/// Restricted identity: no API token mounted into pods.
fn ensure_service_account(declarer: &dyn Declarer, args: &WorkloadArgs) -> Result<String> {
    if let Some(sa) = &args.service_account {
        return Ok(sa.clone());
    }
    let sa = ServiceAccount {
        metadata: metadata(&args.name, args),
        automount_service_account_token: Some(false),
        ..Default::default()
    };
    declarer.declare(AnyResource::from_resource(&sa)?)?;
    Ok(args.name.clone())
}

fn spread_hint(selector: &BTreeMap<String, String>) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            // Advisory only: low weight, never blocks scheduling.
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 1,
                    pod_affinity_term: PodAffinityTerm {
                        topology_key: "kubernetes.io/hostname".to_string(),
                        label_selector: Some(LabelSelector {
                            match_labels: Some(selector.clone()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod_template(args: &WorkloadArgs, service_account: &str) -> PodTemplateSpec {
    let mut pod_labels = args.labels.clone();
    pod_labels.extend(args.selector.clone());
    PodTemplateSpec {
        metadata: Some(ObjectMeta { labels: Some(pod_labels), ..Default::default() }),
        spec: Some(PodSpec {
            service_account_name: Some(service_account.to_string()),
            containers: args.containers.clone(),
            affinity: Some(spread_hint(&args.selector)),
            volumes: if args.volumes.is_empty() { None } else { Some(args.volumes.clone()) },
            ..Default::default()
        }),
    }
}

/// Declare a stateless workload: N interchangeable replicas, rolling
/// replacement on update.
pub fn stateless(declarer: &dyn Declarer, args: WorkloadArgs) -> Result<WorkloadHandle> {
    let replicas = validate(&args)?;
    let service_account = ensure_service_account(declarer, &args)?;

    let deployment = Deployment {
        metadata: metadata(&args.name, &args),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(args.selector.clone()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            }),
            template: pod_template(&args, &service_account),
            ..Default::default()
        }),
        ..Default::default()
    };
    let handle = declarer.declare(AnyResource::from_resource(&deployment)?)?;
    Ok(WorkloadHandle {
        name: handle.name,
        namespace: handle.namespace,
        selector: args.selector,
        replica_addresses: Vec::new(),
    })
}

/// Discovery service name for a stateful workload.
pub fn headless_service_name(workload: &str) -> String {
    format!("{workload}-headless")
}

/// Declare a stateful workload: a headless discovery Service plus a
/// StatefulSet with parallel pod management. Each replica is addressable as
/// `<name>-<i>.<discovery-service>`.
pub fn stateful(declarer: &dyn Declarer, args: WorkloadArgs) -> Result<WorkloadHandle> {
    let replicas = validate(&args)?;
    let service_account = ensure_service_account(declarer, &args)?;

    let svc_name = headless_service_name(&args.name);
    let headless = Service {
        metadata: metadata(&svc_name, &args),
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(args.labels.clone()),
            ..Default::default()
        }),
        ..Default::default()
    };
    declarer.declare(AnyResource::from_resource(&headless)?)?;

    let set = StatefulSet {
        metadata: metadata(&args.name, &args),
        spec: Some(StatefulSetSpec {
            // Replicas have no startup ordering dependency on each other.
            pod_management_policy: Some("Parallel".to_string()),
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(args.selector.clone()),
                ..Default::default()
            },
            service_name: svc_name.clone(),
            update_strategy: Some(StatefulSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            }),
            template: pod_template(&args, &service_account),
            ..Default::default()
        }),
        ..Default::default()
    };
    let handle = declarer.declare(AnyResource::from_resource(&set)?)?;

    let replica_addresses = (0..replicas)
        .map(|i| {
            let svc = svc_name.clone();
            handle.name.map(move |w| format!("{w}-{i}.{svc}"))
        })
        .collect();
    Ok(WorkloadHandle {
        name: handle.name,
        namespace: handle.namespace,
        selector: args.selector,
        replica_addresses,
    })
}
