//! A full probe cycle: a container reporter and the weave tagger describe
//! the same container independently and end up as one node.

use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scoped::collector::Collector;
use scoped::overlay::exec::Stdout;
use scoped::overlay::weave::{WEAVE_DNS_HOSTNAME, WEAVE_MAC_ADDRESS, WEAVE_PEER_NICK_NAME};
use scoped::overlay::{Exec, Process, Weave};
use scoped::probe::docker::{CONTAINER_ID, CONTAINER_IPS};
use scoped::probe::{LogPublisher, Probe, ProbeIntervals, Reporter};
use scoped::report::{make_container_node_id, make_overlay_node_id, NodeMetadata};
use scoped::{Report, Result};

const STATUS: &str = r#"{
    "Router": {"Peers": [{"Name": "winnebago", "NickName": "winny"}]},
    "DNS": {"Entries": [
        {"ContainerID": "83183a667c01", "Hostname": "hostname.weave.local.", "Tombstone": 0},
        {"ContainerID": "0123456789ab", "Hostname": "gone.weave.local.", "Tombstone": 1}
    ]}
}"#;

struct CannedExec(&'static str);

struct CannedProcess(Option<&'static str>);

impl Exec for CannedExec {
    fn spawn(&self, _program: &str, _args: &[&str]) -> io::Result<Box<dyn Process>> {
        Ok(Box::new(CannedProcess(Some(self.0))))
    }
}

#[async_trait]
impl Process for CannedProcess {
    fn take_stdout(&mut self) -> Option<Stdout> {
        self.0.take().map(|s| Box::new(Cursor::new(s.as_bytes())) as Stdout)
    }

    async fn wait(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stands in for the Docker reporter.
struct Containers(Vec<&'static str>);

#[async_trait]
impl Reporter for Containers {
    fn name(&self) -> &str {
        "containers"
    }

    async fn report(&self) -> Result<Report> {
        let mut r = Report::new();
        for id in &self.0 {
            r.container.add_node(
                make_container_node_id("host1", id),
                NodeMetadata::with([(CONTAINER_ID, *id)]),
            );
            r.container_hosts.insert(id.to_string(), "host1".into());
        }
        Ok(r)
    }
}

async fn weave_router() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATUS))
        .mount(&server)
        .await;
    server
}

fn intervals() -> ProbeIntervals {
    ProbeIntervals {
        spy: Duration::from_millis(10),
        publish: Duration::from_millis(50),
        call_timeout: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn container_and_overlay_views_merge_into_one_node() {
    let server = weave_router().await;
    let exec = CannedExec(
        "83183a667c01 d6:f2:5a:12:36:a8 10.0.0.123/24\n\
         0123456789ab 6a:1f:2b:3c:4d:5e 10.0.0.124/24\n\
         garbage\n",
    );
    let weave = Arc::new(Weave::new("host1", &server.uri(), Arc::new(exec)).unwrap());

    let probe = Probe::new(Arc::new(LogPublisher), intervals())
        .with_reporter(Arc::new(Containers(vec!["83183a667c01"])))
        .with_reporter(weave.clone())
        .with_tagger(weave);

    let report = probe.cycle().await;

    assert_eq!(report.container.node_metadatas.len(), 1);
    let node = &report.container.node_metadatas[&make_container_node_id("host1", "83183a667c01")];
    assert_eq!(node.get(CONTAINER_ID), Some("83183a667c01"));
    assert_eq!(node.get(WEAVE_MAC_ADDRESS), Some("d6:f2:5a:12:36:a8"));
    assert_eq!(node.get(CONTAINER_IPS), Some("10.0.0.123"));
    assert_eq!(node.get(WEAVE_DNS_HOSTNAME), Some("hostname.weave.local"));

    let peer = &report.overlay.node_metadatas[&make_overlay_node_id("winnebago")];
    assert_eq!(peer.get(WEAVE_PEER_NICK_NAME), Some("winny"));
}

#[tokio::test]
async fn hosts_merge_in_the_collector() {
    let server = weave_router().await;
    let weave = Arc::new(
        Weave::new("host1", &server.uri(), Arc::new(CannedExec(""))).unwrap(),
    );

    let host1 = Probe::new(Arc::new(LogPublisher), intervals())
        .with_reporter(Arc::new(Containers(vec!["aaaaaaaaaaaa"])))
        .with_reporter(weave.clone());
    let host2 = Probe::new(Arc::new(LogPublisher), intervals())
        .with_reporter(Arc::new(Containers(vec!["bbbbbbbbbbbb"])))
        .with_reporter(weave);

    let collector = Collector::new(Duration::from_secs(15));
    collector.add(host2.cycle().await).await;
    collector.add(host1.cycle().await).await;

    let merged = collector.report().await;
    assert_eq!(merged.container.node_metadatas.len(), 2);
    // Both hosts see the same peer; it stays one node.
    assert_eq!(merged.overlay.node_metadatas.len(), 1);
}
