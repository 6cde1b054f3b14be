//! Metrics store (VictoriaMetrics, single binary).

use anyhow::Result;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, HTTPGetAction, Probe, ServicePort,
    TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateful, WorkloadArgs};

use crate::{service, service_url, StackOpts};

const HTTP_PORT: i32 = 8428;

pub struct Victoria {
    datasource: Datasource,
    remote: RemoteEndpoints,
}

impl Victoria {
    pub fn new(declarer: &dyn Declarer, name: &str, opts: &StackOpts) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Database, name, &opts.namespace);
        let labels = identity.labels();

        let container = Container {
            name: "victoria".to_string(),
            image: Some(format!("victoriametrics/victoria-metrics:{}", opts.tag)),
            args: Some(vec![
                "--retentionPeriod=12".to_string(),
                "-loggerFormat=json".to_string(),
                "--storageDataPath=/victoria-metrics-data".to_string(),
            ]),
            ports: Some(vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: HTTP_PORT,
                ..Default::default()
            }]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    port: IntOrString::String("http".to_string()),
                    path: Some("/health".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            liveness_probe: Some(Probe {
                tcp_socket: Some(TCPSocketAction {
                    port: IntOrString::String("http".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            volume_mounts: Some(vec![VolumeMount {
                name: "storage".to_string(),
                mount_path: "/victoria-metrics-data".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        stateful(
            declarer,
            WorkloadArgs {
                name: identity.name.clone(),
                namespace: identity.namespace.clone(),
                labels: labels.clone(),
                selector: labels.clone(),
                containers: vec![container],
                replicas: Some(1),
                volumes: vec![Volume {
                    name: "storage".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }],
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

        // Single-binary deployment: reads and writes go through the same port.
        let url = service_url(&svc, HTTP_PORT);
        let remote = RemoteEndpoints { read_url: url.clone(), write_url: url.clone() };
        let datasource = Datasource {
            name: identity.name.clone(),
            ds_type: "prometheus".to_string(),
            url,
            json_data: serde_json::Value::Object(Default::default()),
        };
        Ok(Self { datasource, remote })
    }
}

impl GrafanaDatasource for Victoria {
    fn datasource(&self) -> Datasource {
        self.datasource.clone()
    }
}

impl PrometheusStore for Victoria {
    fn remote_endpoints(&self) -> RemoteEndpoints {
        self.remote.clone()
    }
}

impl ScrapeTarget for Victoria {
    // Not yet scraped directly; the capability is still satisfied with an
    // empty endpoint list.
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        Vec::new()
    }
}
