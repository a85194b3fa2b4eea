//! Published port mapping
//!
//! The Airflow webserver always listens on `8080/tcp` inside the container and
//! is published on a configurable host port.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Webserver port inside the container
pub const CONTAINER_WEB_PORT: &str = "8080/tcp";

/// Container port spec (`8080/tcp`) → host port
pub type PortBindings = BTreeMap<String, u32>;

/// Host binding reported by the engine for a running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Container port spec, e.g. `8080/tcp`
    pub container_port: String,
    pub host_port: u32,
    pub host_ip: String,
}

/// Port bindings for an environment container
pub fn compute_ports(port: u32) -> PortBindings {
    let mut ports = PortBindings::new();
    ports.insert(CONTAINER_WEB_PORT.to_string(), port);
    ports
}

/// `--publish` values for the docker CLI
pub fn publish_args(ports: &PortBindings) -> Vec<String> {
    ports
        .iter()
        .map(|(container_port, host_port)| format!("{}:{}", host_port, container_port))
        .collect()
}

/// Parse `NetworkSettings.Ports` of a `docker inspect` document
pub fn parse_port_mappings(container: &serde_json::Value) -> Vec<PortMapping> {
    let Some(ports) = container
        .get("NetworkSettings")
        .and_then(|ns| ns.get("Ports"))
        .and_then(|p| p.as_object())
    else {
        return Vec::new();
    };

    let mut mappings = Vec::new();
    for (container_port, bindings) in ports {
        for binding in bindings.as_array().into_iter().flatten() {
            let host_port = binding
                .get("HostPort")
                .and_then(|hp| hp.as_str())
                .and_then(|hp| hp.parse::<u32>().ok());
            if let Some(host_port) = host_port {
                mappings.push(PortMapping {
                    container_port: container_port.clone(),
                    host_port,
                    host_ip: binding
                        .get("HostIp")
                        .and_then(|ip| ip.as_str())
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
    }
    mappings
}

/// First host port bound to `container_port`
pub fn host_port_for(mappings: &[PortMapping], container_port: &str) -> Option<u32> {
    mappings
        .iter()
        .find(|m| m.container_port == container_port)
        .map(|m| m.host_port)
}
