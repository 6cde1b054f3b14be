//! End-to-end composition scenarios over the recording declarer.

#![forbid(unsafe_code)]

use vigil_core::{Notifier as _, ScrapeTarget as _, Value};
use vigil_platform::{AnyResource, DeclaredHandle, Declarer, ManifestSet};
use vigil_stack::{Alertmanager, Grafana, Loki, StackOpts, Tempo, Victoria, VmAlert};

/// Engine whose handles never resolve, like a reconciler that has not
/// caught up yet.
struct PendingEngine;

impl Declarer for PendingEngine {
    fn declare(&self, _resource: AnyResource) -> anyhow::Result<DeclaredHandle> {
        let (name, _) = Value::deferred();
        let (namespace, _) = Value::deferred();
        Ok(DeclaredHandle { name, namespace })
    }
}

fn find<'a>(resources: &'a [AnyResource], kind: &str, name: &str) -> &'a AnyResource {
    resources
        .iter()
        .find(|r| r.kind == kind && r.name == name)
        .unwrap_or_else(|| panic!("no {kind} named {name}"))
}

#[test]
fn dashboard_provisions_exactly_one_entry_per_datasource() {
    let set = ManifestSet::new();
    let opts = StackOpts::default();
    let logs = Loki::new(&set, "loki", &opts).unwrap();
    let traces = Tempo::new(&set, "tempo", &opts).unwrap();
    let metrics = Victoria::new(&set, "victoria", &opts).unwrap();
    Grafana::new(&set, "grafana", &opts, &[&logs, &traces, &metrics]).unwrap();

    let resources = set.resources();
    let cm = find(&resources, "ConfigMap", "grafana");
    let doc = cm.manifest["data"]["datasources.yaml"].as_str().unwrap();
    let parsed: serde_json::Value = serde_yaml::from_str(doc).unwrap();

    let entries = parsed["datasources"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    let urls: Vec<&str> = entries.iter().map(|e| e["url"].as_str().unwrap()).collect();
    assert_eq!(
        urls,
        vec![
            "http://loki.default:3100",
            "http://tempo.default:16686",
            "http://victoria.default:8428",
        ]
    );
    for entry in entries {
        assert_eq!(entry["access"], "proxy");
        assert_eq!(entry["editable"], false);
    }
    assert_eq!(entries[0]["type"], "loki");
    assert_eq!(entries[1]["type"], "tempo");
    assert_eq!(entries[2]["type"], "prometheus");
}

#[test]
fn dashboard_ingress_points_at_its_service() {
    let set = ManifestSet::new();
    let opts = StackOpts::default();
    let metrics = Victoria::new(&set, "victoria", &opts).unwrap();
    Grafana::new(&set, "grafana", &opts, &[&metrics]).unwrap();

    let resources = set.resources();
    let ing = find(&resources, "Ingress", "grafana");
    let rule = &ing.manifest["spec"]["rules"][0];
    assert_eq!(rule["host"], "grafana.domain.tld");
    let backend = &rule["http"]["paths"][0]["backend"]["service"];
    assert_eq!(backend["name"], "grafana");
    assert_eq!(backend["port"]["name"], "http");
    assert_eq!(
        ing.manifest["metadata"]["annotations"]["kubernetes.io/ingress.class"],
        "nginx"
    );
}

#[test]
fn evaluator_gets_one_notifier_flag_per_receiver() {
    let set = ManifestSet::new();
    let opts = StackOpts::default();
    let store = Victoria::new(&set, "victoria", &opts).unwrap();
    let am = Alertmanager::new(&set, "alertmanager", &opts, None).unwrap();
    VmAlert::new(&set, "vmalert", &opts, &[&am], &store).unwrap();

    let resources = set.resources();
    let dep = find(&resources, "Deployment", "vmalert");
    let args: Vec<String> = dep.manifest["spec"]["template"]["spec"]["containers"][0]["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    let notifier_flags: Vec<&String> =
        args.iter().filter(|a| a.starts_with("-notifier.url=")).collect();
    assert_eq!(notifier_flags.len(), 1);
    assert_eq!(
        notifier_flags[0],
        "-notifier.url=http://alertmanager-0.alertmanager-headless:9093"
    );
    assert!(args.contains(&"-datasource.url=http://victoria.default:8428".to_string()));
    assert!(args.contains(&"-remoteRead.url=http://victoria.default:8428".to_string()));
    assert!(args.contains(&"-remoteWrite.url=http://victoria.default:8428".to_string()));
}

#[test]
fn notifier_urls_track_replica_count() {
    let set = ManifestSet::new();
    let am = Alertmanager::new(&set, "am", &StackOpts::default(), Some(2)).unwrap();
    let urls: Vec<String> =
        am.notification_urls().iter().map(|u| u.get().unwrap()).collect();
    assert_eq!(
        urls,
        vec!["http://am-0.am-headless:9093", "http://am-1.am-headless:9093"]
    );
}

#[test]
fn components_without_metrics_expose_empty_endpoint_lists() {
    let set = ManifestSet::new();
    let opts = StackOpts::default();
    let store = Victoria::new(&set, "victoria", &opts).unwrap();
    let am = Alertmanager::new(&set, "alertmanager", &opts, None).unwrap();
    assert!(store.scrape_endpoints().is_empty());
    assert!(am.scrape_endpoints().is_empty());

    let logs = Loki::new(&set, "loki", &opts).unwrap();
    let eps = logs.scrape_endpoints();
    assert_eq!(eps.len(), 1);
    assert_eq!(eps[0].endpoint.get().as_deref(), Some("loki"));
    assert_eq!(eps[0].port.get().as_deref(), Some("http"));
    assert_eq!(eps[0].namespace.get().as_deref(), Some("default"));
}

#[test]
fn unresolved_config_map_name_fails_construction_instead_of_dropping_it() {
    let opts = StackOpts::default();
    let err = Loki::new(&PendingEngine, "loki", &opts).unwrap_err().to_string();
    assert!(err.contains("config map name not yet resolved"), "err={}", err);

    let err = Alertmanager::new(&PendingEngine, "am", &opts, None).unwrap_err().to_string();
    assert!(err.contains("config map name not yet resolved"), "err={}", err);
}

#[test]
fn identical_composition_renders_identical_manifests() {
    let compose = || {
        let set = ManifestSet::new();
        let opts = StackOpts::default();
        let logs = Loki::new(&set, "loki", &opts).unwrap();
        let traces = Tempo::new(&set, "tempo", &opts).unwrap();
        let metrics = Victoria::new(&set, "victoria", &opts).unwrap();
        Grafana::new(&set, "grafana", &opts, &[&logs, &traces, &metrics]).unwrap();
        let am = Alertmanager::new(&set, "alertmanager", &opts, None).unwrap();
        VmAlert::new(&set, "vmalert", &opts, &[&am], &metrics).unwrap();
        set.to_yaml().unwrap()
    };
    assert_eq!(compose(), compose());
}
