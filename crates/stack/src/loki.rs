//! Log store (Loki).

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, Probe, ServicePort,
    TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateless, WorkloadArgs};

use crate::{config_map, service, service_url, yaml_doc, StackOpts};

const HTTP_PORT: i32 = 3100;
const GOSSIP_PORT: i32 = 7946;

#[derive(Debug)]
pub struct Loki {
    datasource: Datasource,
    endpoints: Vec<ScrapeEndpoint>,
}

impl Loki {
    pub fn new(declarer: &dyn Declarer, name: &str, opts: &StackOpts) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Database, name, &opts.namespace);
        let labels = identity.labels();

        let config = config_map(
            declarer,
            &identity,
            [("config.yaml".to_string(), yaml_doc(&default_config())?)].into(),
        )?;
        let config_name = config.name.get().context("config map name not yet resolved")?;

        let container = Container {
            name: "loki".to_string(),
            image: Some(format!("grafana/loki:{}", opts.tag)),
            args: Some(vec!["-config.file=/etc/loki/config.yaml".to_string()]),
            ports: Some(vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: HTTP_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("gossip".to_string()),
                    container_port: GOSSIP_PORT,
                    ..Default::default()
                },
            ]),
            liveness_probe: Some(Probe {
                tcp_socket: Some(TCPSocketAction {
                    port: IntOrString::String("http".to_string()),
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
                    mount_path: "/etc/loki/config.yaml".to_string(),
                    sub_path: Some("config.yaml".to_string()),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        stateless(
            declarer,
            WorkloadArgs {
                name: identity.name.clone(),
                namespace: identity.namespace.clone(),
                labels: labels.clone(),
                selector: labels.clone(),
                containers: vec![container],
                replicas: Some(1),
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

        let svc = service(
            declarer,
            &identity,
            &labels,
            vec![ServicePort {
                name: Some("http".to_string()),
                port: HTTP_PORT,
                target_port: Some(IntOrString::String("http".to_string())),
                ..Default::default()
            }],
        )?;

        let datasource = Datasource {
            name: identity.name.clone(),
            ds_type: "loki".to_string(),
            url: service_url(&svc, HTTP_PORT),
            json_data: serde_json::Value::Object(Default::default()),
        };
        let endpoints = vec![ScrapeEndpoint {
            endpoint: svc.name.clone(),
            port: Value::ready("http".to_string()),
            namespace: svc.namespace.clone(),
        }];
        Ok(Self { datasource, endpoints })
    }
}

impl GrafanaDatasource for Loki {
    fn datasource(&self) -> Datasource {
        self.datasource.clone()
    }
}

impl ScrapeTarget for Loki {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        self.endpoints.clone()
    }
}

fn default_config() -> serde_json::Value {
    serde_json::json!({
        "auth_enabled": false,
        "server": { "http_listen_port": HTTP_PORT },
        "ingester": {
            "lifecycler": {
                "address": "127.0.0.1",
                "ring": { "kvstore": { "store": "inmemory" }, "replication_factor": 1 },
                "final_sleep": "0s",
            },
            "chunk_idle_period": "1h",
            "max_chunk_age": "1h",
            "chunk_target_size": 1048576,
            "chunk_retain_period": "30s",
            "max_transfer_retries": 0,
        },
        "schema_config": {
            "configs": [{
                "from": "2020-10-24",
                "store": "boltdb-shipper",
                "object_store": "filesystem",
                "schema": "v11",
                "index": { "prefix": "index_", "period": "24h" },
            }],
        },
        "storage_config": {
            "boltdb_shipper": {
                "active_index_directory": "/data/boltdb-shipper-active",
                "cache_location": "/data/boltdb-shipper-cache",
                "cache_ttl": "24h",
                "shared_store": "filesystem",
            },
            "filesystem": { "directory": "/data/chunks" },
        },
        "compactor": {
            "working_directory": "/data/boltdb-shipper-compactor",
            "shared_store": "filesystem",
        },
        "limits_config": {
            "reject_old_samples": true,
            "reject_old_samples_max_age": "168h",
        },
        "chunk_store_config": { "max_look_back_period": "0s" },
        "table_manager": {
            "retention_deletes_enabled": false,
            "retention_period": "0s",
        },
        "ruler": {
            "storage": { "type": "local", "local": { "directory": "/data/rules" } },
            "rule_path": "/data/rules-temp",
            "alertmanager_url": "http://localhost:9093",
            "ring": { "kvstore": { "store": "inmemory" } },
            "enable_api": true,
        },
    })
}
