//! vigilctl: the composition script.
//!
//! The only logic here is ordering: components are constructed in dependency
//! order and already-constructed components are passed to their dependents.

use std::str::FromStr;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use vigil_platform::{apply::apply_all, ManifestSet};
use vigil_stack::{Alertmanager, Grafana, Loki, Nginx, StackOpts, Tempo, Victoria, VmAlert};

#[derive(Parser, Debug)]
#[command(name = "vigilctl", version, about = "Compose and apply the vigil monitoring stack")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace every component is placed in
    #[arg(long = "ns", global = true, default_value = "default")]
    namespace: String,

    /// Image tag applied to every component image
    #[arg(long = "tag", global = true, default_value = "latest")]
    tag: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the composed stack on stdout (YAML, or a JSON resource list)
    Render,
    /// Server-side apply the composed stack to the current cluster
    Apply {
        /// Ask the server to validate without persisting
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("VIGIL_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("VIGIL_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid VIGIL_METRICS_ADDR; expected host:port");
        }
    }
}

/// Construct every component, in dependency order, into one manifest set.
fn compose(opts: &StackOpts) -> Result<ManifestSet> {
    let set = ManifestSet::new();

    // ingress controller
    Nginx::new(&set, "nginx", opts)?;

    // databases
    let logs = Loki::new(&set, "loki", opts)?;
    let traces = Tempo::new(&set, "tempo", opts)?;
    let metrics = Victoria::new(&set, "victoria", opts)?;

    // UI over the three stores
    Grafana::new(&set, "grafana", opts, &[&logs, &traces, &metrics])?;

    // alerting layer
    let alertmanager = Alertmanager::new(&set, "alertmanager", opts, None)?;
    VmAlert::new(&set, "vmalert", opts, &[&alertmanager], &metrics)?;

    Ok(set)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let opts = StackOpts { namespace: cli.namespace.clone(), tag: cli.tag.clone() };

    match cli.command {
        Commands::Render => {
            let set = compose(&opts)?;
            info!(resources = set.len(), "stack composed");
            match cli.output {
                Output::Human => print!("{}", set.to_yaml()?),
                Output::Json => println!("{}", serde_json::to_string_pretty(&set.resources())?),
            }
        }
        Commands::Apply { dry_run } => {
            let set = compose(&opts)?;
            info!(resources = set.len(), dry_run, "stack composed; applying");
            let outcomes = apply_all(&set, dry_run).await?;
            match cli.output {
                Output::Human => {
                    for o in &outcomes {
                        let ns = o.namespace.as_deref().unwrap_or("-");
                        println!("{} {}/{} applied", o.kind, ns, o.name);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_builds_the_full_stack_once() {
        let set = compose(&StackOpts::default()).unwrap();
        let resources = set.resources();
        assert!(!resources.is_empty());
        // One workload per component.
        let deployments = resources.iter().filter(|r| r.kind == "Deployment").count();
        let statefulsets = resources.iter().filter(|r| r.kind == "StatefulSet").count();
        assert_eq!(deployments, 5); // nginx, loki, tempo, grafana, vmalert
        assert_eq!(statefulsets, 2); // victoria, alertmanager
        assert_eq!(resources.iter().filter(|r| r.kind == "Ingress").count(), 1);
    }

    #[test]
    fn composed_resources_serialize_for_json_output() {
        let set = compose(&StackOpts::default()).unwrap();
        let json = serde_json::to_string_pretty(&set.resources()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), set.len());
    }
}
