#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Container;
use vigil_platform::ManifestSet;
use vigil_workload::{headless_service_name, stateful, stateless, WorkloadArgs};

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), "demo".to_string())])
}

fn args(name: &str) -> WorkloadArgs {
    WorkloadArgs {
        name: name.to_string(),
        namespace: "default".to_string(),
        labels: labels(),
        selector: labels(),
        containers: vec![Container { name: "main".to_string(), ..Default::default() }],
        ..Default::default()
    }
}

#[test]
fn stateless_defaults_to_one_replica_and_binds_a_restricted_account() {
    let set = ManifestSet::new();
    let handle = stateless(&set, args("demo")).unwrap();
    assert_eq!(handle.name.get().as_deref(), Some("demo"));
    assert!(handle.replica_addresses.is_empty());

    let resources = set.resources();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].kind, "ServiceAccount");
    assert_eq!(resources[0].manifest["automountServiceAccountToken"], false);
    assert_eq!(resources[1].kind, "Deployment");
    assert_eq!(resources[1].manifest["spec"]["replicas"], 1);
    assert_eq!(resources[1].manifest["spec"]["strategy"]["type"], "RollingUpdate");
    let term = &resources[1].manifest["spec"]["template"]["spec"]["affinity"]["podAntiAffinity"]
        ["preferredDuringSchedulingIgnoredDuringExecution"][0];
    assert_eq!(term["weight"], 1);
    assert_eq!(term["podAffinityTerm"]["topologyKey"], "kubernetes.io/hostname");
}

#[test]
fn supplied_service_account_is_not_recreated() {
    let set = ManifestSet::new();
    let mut a = args("demo");
    a.service_account = Some("existing".to_string());
    stateless(&set, a).unwrap();
    let resources = set.resources();
    assert_eq!(resources.len(), 1);
    assert_eq!(
        resources[0].manifest["spec"]["template"]["spec"]["serviceAccountName"],
        "existing"
    );
}

#[test]
fn stateful_exposes_one_address_per_replica() {
    let set = ManifestSet::new();
    let mut a = args("am");
    a.replicas = Some(3);
    let handle = stateful(&set, a).unwrap();

    let addrs: Vec<String> =
        handle.replica_addresses.iter().map(|v| v.get().unwrap()).collect();
    assert_eq!(addrs, vec!["am-0.am-headless", "am-1.am-headless", "am-2.am-headless"]);

    let resources = set.resources();
    assert_eq!(resources.len(), 3); // account, headless service, stateful set
    assert_eq!(resources[1].kind, "Service");
    assert_eq!(resources[1].name, headless_service_name("am"));
    assert_eq!(resources[1].manifest["spec"]["clusterIP"], "None");
    assert_eq!(resources[2].kind, "StatefulSet");
    assert_eq!(resources[2].manifest["spec"]["podManagementPolicy"], "Parallel");
    assert_eq!(resources[2].manifest["spec"]["serviceName"], "am-headless");
    assert_eq!(resources[2].manifest["spec"]["replicas"], 3);
}

#[test]
fn zero_or_negative_replicas_are_rejected_before_declaring() {
    for bad in [0, -2] {
        let set = ManifestSet::new();
        let mut a = args("demo");
        a.replicas = Some(bad);
        let err = stateless(&set, a).unwrap_err().to_string();
        assert!(err.contains("invalid replica count"), "err={}", err);
        assert!(set.is_empty(), "nothing may be declared on invalid input");
    }
}

#[test]
fn empty_container_list_is_rejected_before_declaring() {
    let set = ManifestSet::new();
    let mut a = args("demo");
    a.containers.clear();
    let err = stateful(&set, a).unwrap_err().to_string();
    assert!(err.contains("container list must not be empty"), "err={}", err);
    assert!(set.is_empty());
}

#[test]
fn identical_arguments_declare_identical_manifests() {
    let render = || {
        let set = ManifestSet::new();
        let mut a = args("am");
        a.replicas = Some(2);
        stateful(&set, a).unwrap();
        set.to_yaml().unwrap()
    };
    assert_eq!(render(), render());
}
