//! Capability contracts components expose to one another.
//!
//! These are deliberately narrow, data-only traits: a component "implements" a
//! capability by handing out values of the matching shape, and consumers take
//! trait objects (or generic bounds) as constructor arguments. There is no
//! registry and no runtime marker; wiring a component that lacks a required
//! capability fails at compile time.

use crate::Value;

/// One metrics endpoint a scraper can collect from.
#[derive(Debug, Clone)]
pub struct ScrapeEndpoint {
    /// Service name hosting the endpoint.
    pub endpoint: Value<String>,
    /// Named service port to scrape.
    pub port: Value<String>,
    pub namespace: Value<String>,
}

/// Component exposing endpoints to collect Prometheus metrics from.
/// A component with nothing to expose returns an empty list, not an error.
pub trait ScrapeTarget {
    fn scrape_endpoints(&self) -> Vec<ScrapeEndpoint>;
}

/// Component exposing URLs that alert notifications should be delivered to.
/// Order is insignificant but stable for a given replica count.
pub trait Notifier {
    fn notification_urls(&self) -> Vec<Value<String>>;
}

/// How a dashboard tool should query a component.
#[derive(Debug, Clone)]
pub struct Datasource {
    pub name: String,
    /// Datasource type tag understood by the dashboard ("loki", "tempo", ...).
    pub ds_type: String,
    pub url: Value<String>,
    /// Extra per-type settings, passed through verbatim.
    pub json_data: serde_json::Value,
}

/// Component usable as a dashboard datasource.
pub trait GrafanaDatasource {
    fn datasource(&self) -> Datasource;
}

/// Prometheus-compatible remote read/write endpoints. The two URLs may be
/// equal (single-binary stores serve both on one port).
#[derive(Debug, Clone)]
pub struct RemoteEndpoints {
    pub read_url: Value<String>,
    pub write_url: Value<String>,
}

/// Component exposing Prometheus-compatible read/write endpoints.
pub trait PrometheusStore {
    fn remote_endpoints(&self) -> RemoteEndpoints;
}
