//! Scoped probe daemon entry point.

use std::sync::Arc;

use log::{error, info};
use tokio::signal;

use scoped::collector::Collector;
use scoped::config::Config;
use scoped::overlay::{OsExec, Weave};
use scoped::probe::{DockerReporter, FanoutPublisher, LogPublisher, Probe, Publisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting scoped probe with config: {:?}", cfg);
    let host_id = cfg.host_id().to_string();

    // Reports are kept locally over the window and logged on publish.
    let collector = Arc::new(Collector::new(cfg.window()));
    let publisher: Arc<dyn Publisher> = Arc::new(FanoutPublisher(vec![
        collector.clone() as Arc<dyn Publisher>,
        Arc::new(LogPublisher),
    ]));

    let mut probe = Probe::new(publisher, cfg.intervals());

    if cfg.docker {
        match DockerReporter::new(host_id.clone(), cfg.docker_network.clone()) {
            Ok(docker) => probe = probe.with_reporter(Arc::new(docker)),
            Err(e) => error!("Docker reporter disabled: {}", e),
        }
    }

    // Weave both reports the overlay and tags containers found by docker.
    if let Some(url) = &cfg.weave_router_url {
        let weave = Arc::new(Weave::new(host_id.clone(), url, Arc::new(OsExec))?.with_command(&cfg.weave_command));
        probe = probe.with_reporter(weave.clone()).with_tagger(weave);
    }

    let handles = probe.spawn();

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    for handle in handles {
        handle.abort();
    }

    let last = collector.report().await;
    info!("Shutdown complete, {} nodes in the last window.", last.node_count());
    Ok(())
}
