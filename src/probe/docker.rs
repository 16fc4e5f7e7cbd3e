use super::Reporter;
use crate::error::{ProbeError, Result};
use crate::report::{make_container_node_id, NodeMetadata, Report};
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;
use log::debug;

pub const CONTAINER_ID: &str = "docker_container_id";
pub const CONTAINER_NAME: &str = "docker_container_name";
pub const CONTAINER_IPS: &str = "docker_container_ips";
pub const IMAGE_ID: &str = "docker_image_id";
pub const IMAGE_NAME: &str = "docker_image_name";

/// Reports running containers and their images from the local Docker daemon.
pub struct DockerReporter {
    host_id: String,
    network_name: Option<String>,
    docker: Docker,
}

impl DockerReporter {
    /// Connects to the local daemon (unix socket on Linux). No request is
    /// made until the first report.
    pub fn new(host_id: impl Into<String>, network_name: Option<String>) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(unavailable)?;
        Ok(Self {
            host_id: host_id.into(),
            network_name,
            docker,
        })
    }
}

fn unavailable(e: bollard::errors::Error) -> ProbeError {
    ProbeError::UpstreamUnavailable {
        endpoint: "docker".into(),
        source: Box::new(e),
    }
}

#[async_trait]
impl Reporter for DockerReporter {
    fn name(&self) -> &str {
        "docker"
    }

    async fn report(&self) -> Result<Report> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(opts))
            .await
            .map_err(unavailable)?;
        debug!("Docker lists {} running containers", containers.len());

        let mut report = Report::new();
        for c in &containers {
            add_container(&mut report, &self.host_id, self.network_name.as_deref(), c);
        }
        Ok(report)
    }
}

/// Adds one container (and its image) to `report`. Summaries without an id
/// are skipped.
fn add_container(
    report: &mut Report,
    host_id: &str,
    network_name: Option<&str>,
    c: &ContainerSummary,
) {
    let Some(id) = c.id.as_deref().filter(|id| !id.is_empty()) else {
        return;
    };

    let mut md = NodeMetadata::with([(CONTAINER_ID, id)]);
    if let Some(name) = c.names.as_ref().and_then(|n| n.first()) {
        md.insert(CONTAINER_NAME, name.trim_start_matches('/'));
    }
    if let Some(image_id) = &c.image_id {
        md.insert(IMAGE_ID, image_id.as_str());
    }
    let ips = container_ips(c, network_name);
    if !ips.is_empty() {
        md.insert(CONTAINER_IPS, ips.join(" "));
    }
    report
        .container
        .add_node(make_container_node_id(host_id, id), md);
    report
        .container_hosts
        .insert(id.to_string(), host_id.to_string());

    if let Some(image_id) = c.image_id.as_deref().filter(|i| !i.is_empty()) {
        let mut image = NodeMetadata::with([(IMAGE_ID, image_id)]);
        if let Some(name) = &c.image {
            image.insert(IMAGE_NAME, name.as_str());
        }
        report
            .container_image
            .add_node(make_container_node_id(host_id, image_id), image);
    }
}

/// Addresses of the container, sorted. Restricted to one network when a
/// name is given.
fn container_ips(c: &ContainerSummary, network_name: Option<&str>) -> Vec<String> {
    let mut ips = Vec::new();
    if let Some(networks) = c.network_settings.as_ref().and_then(|s| s.networks.as_ref()) {
        for (name, net) in networks {
            if network_name.is_some_and(|n| n != name) {
                continue;
            }
            for ip in [&net.ip_address, &net.global_ipv6_address].into_iter().flatten() {
                if !ip.is_empty() {
                    ips.push(ip.clone());
                }
            }
        }
    }
    ips.sort();
    ips.dedup();
    ips
}
