//! Ingress controller (ingress-nginx), run as a plain stateless workload
//! with a separate metrics service for scraping.

use anyhow::Result;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, Probe, ServicePort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use vigil_core::prelude::*;
use vigil_platform::Declarer;
use vigil_workload::{stateless, WorkloadArgs};

use crate::{service, StackOpts};

const HTTP_PORT: i32 = 80;
const HTTPS_PORT: i32 = 443;
// If this port changes, the readiness probe must follow.
const METRICS_PORT: i32 = 10254;

pub struct Nginx {
    endpoints: Vec<ScrapeEndpoint>,
}

impl Nginx {
    pub fn new(declarer: &dyn Declarer, name: &str, opts: &StackOpts) -> Result<Self> {
        let identity = Identity::new(ComponentKind::Ingress, name, &opts.namespace);
        let labels = identity.labels();

        let container = Container {
            name: "controller".to_string(),
            image: Some(format!("registry.k8s.io/ingress-nginx/controller:{}", opts.tag)),
            args: Some(vec![
                "/nginx-ingress-controller".to_string(),
                format!("--election-id={name}-leader"),
                "--ingress-class=nginx".to_string(),
            ]),
            ports: Some(vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: HTTP_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("https".to_string()),
                    container_port: HTTPS_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("metrics".to_string()),
                    container_port: METRICS_PORT,
                    ..Default::default()
                },
            ]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    port: IntOrString::Int(METRICS_PORT),
                    path: Some("/healthz".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
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
                volumes: Vec::new(),
                service_account: None,
            },
        )?;

        service(
            declarer,
            &identity,
            &labels,
            vec![
                ServicePort {
                    name: Some("http".to_string()),
                    port: HTTP_PORT,
                    target_port: Some(IntOrString::String("http".to_string())),
                    ..Default::default()
                },
                ServicePort {
                    name: Some("https".to_string()),
                    port: HTTPS_PORT,
                    target_port: Some(IntOrString::String("https".to_string())),
                    ..Default::default()
                },
            ],
        )?;

        let metrics_identity =
            Identity::new(ComponentKind::Ingress, format!("{name}-metrics"), &opts.namespace);
        let metrics_svc = service(
            declarer,
            &metrics_identity,
            &labels,
            vec![ServicePort {
                name: Some("metrics".to_string()),
                port: METRICS_PORT,
                target_port: Some(IntOrString::String("metrics".to_string())),
                ..Default::default()
            }],
        )?;

        let endpoints = vec![ScrapeEndpoint {
            endpoint: metrics_svc.name.clone(),
            port: Value::ready("metrics".to_string()),
            namespace: metrics_svc.namespace.clone(),
        }];
        Ok(Self { endpoints })
    }
}

impl ScrapeTarget for Nginx {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint> {
        self.endpoints.clone()
    }
}
