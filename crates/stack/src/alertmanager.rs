//! Alert manager (Prometheus Alertmanager), stateful so every replica keeps a
//! stable, individually addressable name for notification delivery.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, HTTPGetAction, Probe,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateful, WorkloadArgs};

use crate::{config_map, yaml_doc, StackOpts};

const HTTP_PORT: i32 = 9093;
const CLUSTER_PORT: i32 = 9094;

#[derive(Debug)]
pub struct Alertmanager {
    notification_urls: Vec<Value<String>>,
}

impl Alertmanager {
    pub fn new(
        declarer: &dyn Declarer,
        name: &str,
        opts: &StackOpts,
        replicas: Option<i32>,
    ) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Notifier, name, &opts.namespace);
        let labels = identity.labels();

        let config = config_map(
            declarer,
            &identity,
            [("alertmanager.yaml".to_string(), yaml_doc(&default_config())?)].into(),
        )?;
        let config_name = config.name.get().context("config map name not yet resolved")?;

        let container = Container {
            name: "alertmanager".to_string(),
            image: Some(format!("prom/alertmanager:{}", opts.tag)),
            args: Some(vec![
                "--config.file=/etc/alertmanager/alertmanager.yaml".to_string(),
                "--storage.path=/data".to_string(),
            ]),
            ports: Some(vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: HTTP_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("cluster".to_string()),
                    container_port: CLUSTER_PORT,
                    ..Default::default()
                },
            ]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    port: IntOrString::String("http".to_string()),
                    path: Some("/-/ready".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            liveness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    port: IntOrString::String("http".to_string()),
                    path: Some("/-/healthy".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "storage".to_string(),
                    mount_path: "/data".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: "/etc/alertmanager/alertmanager.yaml".to_string(),
                    sub_path: Some("alertmanager.yaml".to_string()),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let workload = stateful(
            declarer,
            WorkloadArgs {
                name: identity.name.clone(),
                namespace: identity.namespace.clone(),
                labels: labels.clone(),
                selector: labels,
                containers: vec![container],
                replicas,
                volumes: vec![
                    Volume {
                        name: "storage".to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    },
                    Volume {
                        name: "config".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(config_name),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                service_account: None,
            },
        )?;

        // One receiver per replica, addressed through the discovery service.
        let notification_urls = workload
            .replica_addresses
            .iter()
            .map(|addr| addr.map(|a| format!("http://{a}:{HTTP_PORT}")))
            .collect();
        Ok(Self { notification_urls })
    }
}

impl Notifier for Alertmanager {
    fn notification_urls(&self) -> Vec<Value<String>> {
        self.notification_urls.clone()
    }
}

impl ScrapeTarget for Alertmanager {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        Vec::new()
    }
}

fn default_config() -> serde_json::Value {
    serde_json::json!({
        "global": { "resolve_timeout": "5m" },
        "route": {
            "group_by": ["alertname"],
            "group_wait": "10s",
            "group_interval": "10s",
            "repeat_interval": "1h",
            "receiver": "devnull",
            "routes": [],
        },
        "receivers": [{ "name": "devnull" }],
        "inhibit_rules": [],
    })
}
