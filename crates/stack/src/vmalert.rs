//! Alert evaluator (vmalert): evaluates rules against a Prometheus-compatible
//! store and fans notifications out to every wired notifier.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, HTTPGetAction, Probe, ServicePort,
    TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateless, WorkloadArgs};

use crate::{config_map, service, StackOpts};

const HTTP_PORT: i32 = 8880;

pub struct VmAlert {
    endpoints: Vec<ScrapeEndpoint>,
}

impl VmAlert {
    /// Requires an already-constructed metrics store and zero or more
    /// notifiers; the caller owns construction ordering.
    pub fn new(
        declarer: &dyn Declarer,
        name: &str,
        opts: &StackOpts,
        notifiers: &[&dyn Notifier],
        storage: &dyn PrometheusStore,
    ) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Notifier, name, &opts.namespace);
        let labels = identity.labels();

        // Notifications go to every receiver of every notifier at once.
        let mut args = Vec::new();
        for notifier in notifiers {
            for url in notifier.notification_urls() {
                let url = url.get().context("notifier address not yet resolved")?;
                args.push(format!("-notifier.url={url}"));
            }
        }
        let remote = storage.remote_endpoints();
        let read = remote.read_url.get().context("store read address not yet resolved")?;
        let write = remote.write_url.get().context("store write address not yet resolved")?;
        args.push(format!("-datasource.url={read}"));
        args.push(format!("-remoteRead.url={read}"));
        args.push(format!("-remoteWrite.url={write}"));
        args.push("-rule=/etc/vmalert/*.yaml".to_string());
        args.push("-rule.validateExpressions=true".to_string());
        args.push("-rule.validateTemplates=true".to_string());
        args.push("-loggerFormat=json".to_string());

        let config = config_map(
            declarer,
            &identity,
            [("alerts.yaml".to_string(), String::new())].into(),
        )?;
        let config_name = config.name.get().context("config map name not yet resolved")?;

        let container = Container {
            name: "vmalert".to_string(),
            image: Some(format!("victoriametrics/vmalert:{}", opts.tag)),
            args: Some(args),
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
                name: "config".to_string(),
                mount_path: "/etc/vmalert/alerts.yaml".to_string(),
                sub_path: Some("alerts.yaml".to_string()),
                read_only: Some(true),
                ..Default::default()
            }]),
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
                volumes: vec![Volume {
                    name: "config".to_string(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: Some(config_name),
                        ..Default::default()
                    }),
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

        let endpoints = vec![ScrapeEndpoint {
            endpoint: svc.name.clone(),
            port: Value::ready("http".to_string()),
            namespace: svc.namespace.clone(),
        }];
        Ok(Self { endpoints })
    }
}

impl ScrapeTarget for VmAlert {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        self.endpoints.clone()
    }
}
