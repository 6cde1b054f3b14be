//! Trace store (Tempo) with its Jaeger-compatible query sidecar.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, ServicePort, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateless, WorkloadArgs};

use crate::{config_map, service, service_url, yaml_doc, StackOpts};

const QUERY_PORT: i32 = 16686;
const OTLP_PORT: i32 = 55680;

pub struct Tempo {
    datasource: Datasource,
    endpoints: Vec<ScrapeEndpoint>,
}

impl Tempo {
    pub fn new(declarer: &dyn Declarer, name: &str, opts: &StackOpts) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Database, name, &opts.namespace);
        let labels = identity.labels();

        let query_config = serde_json::json!({ "backend": "localhost:3100" });
        let config = config_map(
            declarer,
            &identity,
            [
                ("tempo.yaml".to_string(), yaml_doc(&default_config())?),
                ("query.yaml".to_string(), yaml_doc(&query_config)?),
            ]
            .into(),
        )?;
        let config_name = config.name.get().context("config map name not yet resolved")?;

        let tempo = Container {
            name: "tempo".to_string(),
            image: Some(format!("grafana/tempo:{}", opts.tag)),
            args: Some(vec!["-config.file=/etc/tempo/tempo.yaml".to_string()]),
            ports: Some(vec![ContainerPort {
                name: Some("grpc-otlp".to_string()),
                container_port: OTLP_PORT,
                ..Default::default()
            }]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "storage".to_string(),
                    mount_path: "/var/tempo".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: "/etc/tempo/tempo.yaml".to_string(),
                    sub_path: Some("tempo.yaml".to_string()),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        let query = Container {
            name: "query".to_string(),
            image: Some(format!("grafana/tempo-query:{}", opts.tag)),
            args: Some(vec![
                "--grpc-storage-plugin.configuration-file=/etc/tempo/query.yaml".to_string(),
            ]),
            ports: Some(vec![ContainerPort {
                name: Some("http-query".to_string()),
                container_port: QUERY_PORT,
                ..Default::default()
            }]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "storage".to_string(),
                    mount_path: "/var/tempo".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: "/etc/tempo/query.yaml".to_string(),
                    sub_path: Some("query.yaml".to_string()),
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
                containers: vec![tempo, query],
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
            vec![
                // The query port goes first: the datasource URL points at it.
                ServicePort {
                    name: Some("http-query".to_string()),
                    port: QUERY_PORT,
                    target_port: Some(IntOrString::String("http-query".to_string())),
                    ..Default::default()
                },
                ServicePort {
                    name: Some("grpc-otlp".to_string()),
                    port: OTLP_PORT,
                    target_port: Some(IntOrString::String("grpc-otlp".to_string())),
                    ..Default::default()
                },
            ],
        )?;

        let datasource = Datasource {
            name: identity.name.clone(),
            ds_type: "tempo".to_string(),
            url: service_url(&svc, QUERY_PORT),
            json_data: serde_json::Value::Object(Default::default()),
        };
        let endpoints = vec![ScrapeEndpoint {
            endpoint: svc.name.clone(),
            port: Value::ready("http-query".to_string()),
            namespace: svc.namespace.clone(),
        }];
        Ok(Self { datasource, endpoints })
    }
}

impl GrafanaDatasource for Tempo {
    fn datasource(&self) -> Datasource {
        self.datasource.clone()
    }
}

impl ScrapeTarget for Tempo {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        self.endpoints.clone()
    }
}

fn default_config() -> serde_json::Value {
    serde_json::json!({
        "auth_enabled": false,
        "server": { "http_listen_port": 3100 },
        "distributor": {
            "receivers": {
                "otlp": { "protocols": { "grpc": { "endpoint": "0.0.0.0:55680" } } },
            },
        },
        "ingester": {
            "trace_idle_period": "10s",
            "traces_per_block": 100,
            "max_block_duration": "5m",
        },
        "compactor": {
            "compaction": {
                "compaction_window": "1h",
                "max_compaction_objects": 1000000,
                "block_retention": "1h",
                "compacted_block_retention": "10m",
            },
        },
        "storage": {
            "trace": {
                "backend": "local",
                "wal": {
                    "path": "/tmp/tempo/wal",
                    "bloom_filter_false_positive": 0.05,
                    "index_downsample": 10,
                },
                "local": { "path": "/tmp/tempo/blocks" },
                "pool": { "max_workers": 100, "queue_depth": 10000 },
            },
        },
    })
}
