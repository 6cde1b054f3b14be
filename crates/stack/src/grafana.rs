//! Dashboard UI (Grafana): consumes datasource capabilities from
//! already-constructed components and provisions them declaratively.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, HTTPGetAction, Probe,
    ServicePort, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::{AnyResource, DeclaredHandle, Declarer};
use vigil_workload::{stateless, WorkloadArgs};

use crate::{config_map, ini, service, yaml_doc, StackOpts};

const HTTP_PORT: i32 = 3000;
const INGRESS_HOST: &str = "grafana.domain.tld";

pub struct Grafana {
    endpoints: Vec<ScrapeEndpoint>,
}

impl Grafana {
    /// Requires the datasource components to be constructed first; their
    /// resolved addresses are baked into the provisioning document.
    pub fn new(
        declarer: &dyn Declarer,
        name: &str,
        opts: &StackOpts,
        datasources: &[&dyn GrafanaDatasource],
    ) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Dashboard, name, &opts.namespace);
        let labels = identity.labels();

        let mut entries = Vec::new();
        for source in datasources {
            let ds = source.datasource();
            let url = ds
                .url
                .get()
                .with_context(|| format!("datasource {} address not yet resolved", ds.name))?;
            entries.push(serde_json::json!({
                "name": ds.name,
                "type": ds.ds_type,
                "access": "proxy",
                "editable": false,
                "jsonData": ds.json_data,
                "url": url,
            }));
        }
        let provisioning = serde_json::json!({ "apiVersion": 1, "datasources": entries });

        let config = config_map(
            declarer,
            &identity,
            [
                ("grafana.ini".to_string(), ini::encode(&default_config())),
                ("datasources.yaml".to_string(), yaml_doc(&provisioning)?),
            ]
            .into(),
        )?;
        let config_name = config.name.get().context("config map name not yet resolved")?;

        let container = Container {
            name: "grafana".to_string(),
            image: Some(format!("grafana/grafana:{}", opts.tag)),
            ports: Some(vec![ContainerPort {
                name: Some("http".to_string()),
                container_port: HTTP_PORT,
                ..Default::default()
            }]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    port: IntOrString::String("http".to_string()),
                    path: Some("/api/health".to_string()),
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
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "storage".to_string(),
                    mount_path: "/var/lib/grafana".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: "/etc/grafana/provisioning/datasources/datasources.yaml"
                        .to_string(),
                    sub_path: Some("datasources.yaml".to_string()),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: "/etc/grafana/grafana.ini".to_string(),
                    sub_path: Some("grafana.ini".to_string()),
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
        Self::declare_ingress(declarer, &identity, &svc)?;

        let endpoints = vec![ScrapeEndpoint {
            endpoint: svc.name.clone(),
            port: Value::ready("http".to_string()),
            namespace: svc.namespace.clone(),
        }];
        Ok(Self { endpoints })
    }

    fn declare_ingress(
        declarer: &dyn Declarer,
        identity: &Identity,
        svc: &DeclaredHandle,
    ) -> Result<()> {
        let backend_name = svc.name.get().context("service name not yet resolved")?;
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some(identity.name.clone()),
                namespace: Some(identity.namespace.clone()),
                annotations: Some(
                    [("kubernetes.io/ingress.class".to_string(), "nginx".to_string())].into(),
                ),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(INGRESS_HOST.to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: backend_name,
                                    port: Some(ServiceBackendPort {
                                        name: Some("http".to_string()),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        declarer.declare(AnyResource::from_resource(&ingress)?)?;
        Ok(())
    }
}

impl ScrapeTarget for Grafana {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        self.endpoints.clone()
    }
}

// https://grafana.com/docs/grafana/latest/administration/configuration/
fn default_config() -> serde_json::Value {
    serde_json::json!({
        "analytics": { "reporting_enabled": false },
        "server": {
            "root_url": "http://localhost:3000",
            "router_logging": false,
            "enable_gzip": true,
        },
        "security": {
            "cookie_secure": true,
            "disable_brute_force_login_protection": true,
            "x_xss_protection": true,
            "admin_user": "admin",
            "admin_password": "admin",
        },
        "dataproxy": { "timeout": 300, "send_user_header": true },
        "log": {
            "mode": "console",
            "console": { "level": "warn", "format": "text" },
        },
        "auth": {
            "disable_login_form": true,
            "disable_signout_menu": true,
            "anonymous": { "enabled": true, "org_role": "Admin" },
        },
        "panels": { "enable_alpha": true },
        "tracing": {
            "jaeger": {
                "address": "localhost:6831",
                "sampler_type": "const",
                "sampler_param": "1",
            },
        },
    })
}
