//! Weave overlay network tagger.
//!
//! As a [`Reporter`] it asks the local weave router for its peers and for
//! the weaveDNS table. As a [`Tagger`] it runs `weave --local ps` and
//! attaches MAC address, IP and DNS hostname to the matching container
//! nodes of an existing report.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;

use super::exec::Exec;
use crate::error::{ProbeError, Result};
use crate::probe::docker::{CONTAINER_ID, CONTAINER_IPS};
use crate::probe::{Reporter, Tagger};
use crate::report::{make_overlay_node_id, parse_node_id, NodeMetadata, Report};

pub const WEAVE_PEER_NAME: &str = "weave_peer_name";
pub const WEAVE_PEER_NICK_NAME: &str = "weave_peer_nick_name";
pub const WEAVE_DNS_HOSTNAME: &str = "weave_dns_hostname";
pub const WEAVE_MAC_ADDRESS: &str = "weave_mac_address";

pub const DEFAULT_COMMAND: &str = "weave";

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(rename = "Router")]
    router: Router,
    #[serde(rename = "DNS")]
    dns: Dns,
}

#[derive(Debug, Deserialize)]
struct Router {
    #[serde(rename = "Peers")]
    peers: Vec<Peer>,
}

#[derive(Debug, Deserialize)]
struct Peer {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NickName", alias = "Nickname")]
    nick_name: String,
}

#[derive(Debug, Deserialize)]
struct Dns {
    #[serde(rename = "Entries")]
    entries: Vec<DnsEntry>,
}

#[derive(Debug, Deserialize)]
struct DnsEntry {
    #[serde(rename = "ContainerID")]
    container_id: String,
    #[serde(rename = "Hostname")]
    hostname: String,
    #[serde(rename = "Tombstone", default)]
    tombstone: i64,
}

/// One line of `weave ps`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PsEntry {
    container_id: String,
    mac: String,
    ip: IpAddr,
}

/// Parses `<container id> <mac> <ip>/<prefix>`. Anything else is `None`.
fn parse_ps_line(line: &str) -> Option<PsEntry> {
    let mut tokens = line.split_whitespace();
    let (Some(container_id), Some(mac), Some(cidr), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return None;
    };
    let ip = cidr.split('/').next()?.parse().ok()?;
    Some(PsEntry {
        container_id: container_id.to_string(),
        mac: mac.to_string(),
        ip,
    })
}

pub struct Weave {
    host_id: String,
    url: String,
    command: String,
    client: reqwest::Client,
    exec: Arc<dyn Exec>,
    /// Container id to its hostnames, from the last successful report.
    hostnames: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl Weave {
    /// `router_url` is the base address of the weave router's HTTP API, with
    /// or without a scheme. Only containers on `host_id` are tagged.
    pub fn new(
        host_id: impl Into<String>,
        router_url: &str,
        exec: Arc<dyn Exec>,
    ) -> Result<Self, reqwest::Error> {
        let base = router_url.trim_end_matches('/');
        let url = if base.contains("://") {
            format!("{base}/report")
        } else {
            format!("http://{base}/report")
        };
        Ok(Self {
            host_id: host_id.into(),
            url,
            command: DEFAULT_COMMAND.to_string(),
            client: reqwest::Client::builder().build()?,
            exec,
            hostnames: RwLock::new(BTreeMap::new()),
        })
    }

    /// Overrides the program used for `--local ps`.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn unavailable(&self, e: reqwest::Error) -> ProbeError {
        ProbeError::UpstreamUnavailable {
            endpoint: self.url.clone(),
            source: Box::new(e),
        }
    }

    async fn status(&self) -> Result<Status> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.unavailable(e))?
            .bytes()
            .await
            .map_err(|e| self.unavailable(e))?;
        serde_json::from_slice(&body).map_err(|source| ProbeError::MalformedUpstreamData {
            endpoint: self.url.clone(),
            source,
        })
    }

    async fn ps(&self) -> Result<Vec<PsEntry>> {
        let args = ["--local", "ps"];
        let failure = |source: std::io::Error| ProbeError::InspectionFailure {
            command: format!("{} {}", self.command, args.join(" ")),
            source,
        };

        let mut process = self.exec.spawn(&self.command, &args).map_err(failure)?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| failure(std::io::Error::other("stdout not captured")))?;

        let mut entries = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.map_err(failure)? {
            match parse_ps_line(&line) {
                Some(entry) => entries.push(entry),
                None => debug!("Skipping weave ps line {:?}", line),
            }
        }
        process.wait().await.map_err(failure)?;
        Ok(entries)
    }
}

#[async_trait]
impl Reporter for Weave {
    fn name(&self) -> &str {
        "weave"
    }

    async fn report(&self) -> Result<Report> {
        let status = self.status().await?;

        let mut report = Report::new();
        for peer in status.router.peers {
            report.overlay.add_node(
                make_overlay_node_id(&peer.name),
                NodeMetadata::with([
                    (WEAVE_PEER_NAME, peer.name),
                    (WEAVE_PEER_NICK_NAME, peer.nick_name),
                ]),
            );
        }

        let mut hostnames: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for e in status.dns.entries.into_iter().filter(|e| e.tombstone == 0) {
            let hostname = e.hostname.strip_suffix('.').unwrap_or(&e.hostname).to_string();
            hostnames.entry(e.container_id).or_default().insert(hostname);
        }
        *self.hostnames.write().await = hostnames;

        Ok(report)
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Tagger for Weave {
    fn name(&self) -> &str {
        "weave"
    }

    async fn tag(&self, report: &Report) -> Result<Report> {
        let entries = self.ps().await?;
        let hostnames = self.hostnames.read().await;

        let mut tagged = report.clone();
        for (node_id, md) in tagged.container.node_metadatas.iter_mut() {
            if parse_node_id(node_id).map(|(host, _)| host) != Some(self.host_id.as_str()) {
                continue;
            }
            let Some(container_id) = md.get(CONTAINER_ID).map(str::to_string) else {
                continue;
            };
            // ps prints short ids; the container reporter records full ones.
            let Some(entry) = entries
                .iter()
                .find(|e| container_id.starts_with(e.container_id.as_str()))
            else {
                continue;
            };

            md.insert(WEAVE_MAC_ADDRESS, entry.mac.as_str());
            let mut ips: BTreeSet<String> = md
                .get(CONTAINER_IPS)
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            ips.insert(entry.ip.to_string());
            md.insert(CONTAINER_IPS, join(&ips));
            if let Some(names) = hostnames
                .get(&container_id)
                .or_else(|| hostnames.get(&entry.container_id))
            {
                md.insert(WEAVE_DNS_HOSTNAME, join(names));
            }
        }
        Ok(tagged)
    }
}
