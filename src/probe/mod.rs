//! The probe: drives reporters and taggers and publishes host reports.
//!
//! Reporters each run on their own timer and hand their reports to a single
//! collector task, which is the only writer of the pending host report. It
//! keeps the latest report from each reporter; a newer one replaces the older
//! rather than merging with it, so edge counters are never summed across spy
//! ticks. On every publish tick the latest reports are merged, passed through
//! the taggers in registration order and handed to the [`Publisher`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::error::Result;
use crate::report::Report;

pub mod docker;
pub use docker::DockerReporter;

/// Produces a fresh report about the entities it is authoritative for.
#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    async fn report(&self) -> Result<Report>;
}

/// Enriches a report with metadata only it can compute.
///
/// Implementations return a new report and leave the input untouched, so a
/// failed call means no enrichment was applied.
#[async_trait]
pub trait Tagger: Send + Sync {
    fn name(&self) -> &str;

    async fn tag(&self, report: &Report) -> Result<Report>;
}

/// Ships a finished host report somewhere.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, report: Report) -> anyhow::Result<()>;
}

/// Publishes by logging a summary, and the full report at debug level.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, report: Report) -> anyhow::Result<()> {
        info!(
            "Report: {} nodes ({} containers, {} overlay peers)",
            report.node_count(),
            report.container.node_metadatas.len(),
            report.overlay.node_metadatas.len()
        );
        if log::log_enabled!(log::Level::Debug) {
            debug!("{}", serde_json::to_string(&report)?);
        }
        Ok(())
    }
}

/// Publishes to several publishers in turn.
pub struct FanoutPublisher(pub Vec<Arc<dyn Publisher>>);

#[async_trait]
impl Publisher for FanoutPublisher {
    async fn publish(&self, report: Report) -> anyhow::Result<()> {
        for p in &self.0 {
            p.publish(report.clone()).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeIntervals {
    /// How often each reporter runs.
    pub spy: Duration,
    /// How often the pending report is tagged and published.
    pub publish: Duration,
    /// Upper bound on a single reporter or tagger call.
    pub call_timeout: Duration,
}

pub struct Probe {
    reporters: Vec<Arc<dyn Reporter>>,
    taggers: Vec<Arc<dyn Tagger>>,
    publisher: Arc<dyn Publisher>,
    intervals: ProbeIntervals,
}

impl Probe {
    pub fn new(publisher: Arc<dyn Publisher>, intervals: ProbeIntervals) -> Self {
        Self {
            reporters: Vec::new(),
            taggers: Vec::new(),
            publisher,
            intervals,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Taggers run in the order they are added.
    pub fn with_tagger(mut self, tagger: Arc<dyn Tagger>) -> Self {
        self.taggers.push(tagger);
        self
    }

    /// Runs one reporter call, bounded by the call timeout.
    async fn collect(reporter: &dyn Reporter, limit: Duration) -> Option<Report> {
        match timeout(limit, reporter.report()).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!("Reporter {} failed: {}", reporter.name(), e);
                None
            }
            Err(_) => {
                warn!("Reporter {} timed out after {:?}", reporter.name(), limit);
                None
            }
        }
    }

    /// Passes `report` through every tagger. A failing tagger is skipped and
    /// the report it was given carries on unchanged.
    pub async fn tag(&self, mut report: Report) -> Report {
        for tagger in &self.taggers {
            match timeout(self.intervals.call_timeout, tagger.tag(&report)).await {
                Ok(Ok(tagged)) => report = tagged,
                Ok(Err(e)) => warn!("Tagger {} failed: {}", tagger.name(), e),
                Err(_) => warn!(
                    "Tagger {} timed out after {:?}",
                    tagger.name(),
                    self.intervals.call_timeout
                ),
            }
        }
        report
    }

    /// Runs every reporter once, merges the results and tags them.
    pub async fn cycle(&self) -> Report {
        let limit = self.intervals.call_timeout;
        let reports = futures_util::future::join_all(
            self.reporters
                .iter()
                .map(|r| Self::collect(r.as_ref(), limit)),
        )
        .await;
        let merged = reports
            .into_iter()
            .flatten()
            .fold(Report::new(), Report::merged);
        self.tag(merged).await
    }

    /// Spawns the reporter tasks and the publish loop. Abort the returned
    /// handles to stop.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let (report_tx, mut report_rx) = mpsc::channel::<(usize, Report)>(128);
        let mut handles = Vec::with_capacity(self.reporters.len() + 1);

        for (index, reporter) in self.reporters.iter().enumerate() {
            let reporter = Arc::clone(reporter);
            let tx = report_tx.clone();
            let ProbeIntervals {
                spy, call_timeout, ..
            } = self.intervals;
            handles.push(tokio::spawn(async move {
                let mut ticker = interval(spy);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Some(report) = Self::collect(reporter.as_ref(), call_timeout).await {
                        if tx.send((index, report)).await.is_err() {
                            debug!("Probe closed, stopping reporter {}", reporter.name());
                            return;
                        }
                    }
                }
            }));
        }
        drop(report_tx);

        handles.push(tokio::spawn(async move {
            let mut latest: BTreeMap<usize, Report> = BTreeMap::new();
            let mut ticker = interval(self.intervals.publish);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // publish has had a chance to collect something.
            ticker.tick().await;
            loop {
                tokio::select! {
                    received = report_rx.recv() => match received {
                        Some((index, report)) => {
                            latest.insert(index, report);
                        }
                        None => {
                            info!("All reporters stopped, shutting down publish loop");
                            return;
                        }
                    },
                    _ = ticker.tick() => {
                        let pending = std::mem::take(&mut latest)
                            .into_values()
                            .fold(Report::new(), Report::merged);
                        let report = self.tag(pending).await;
                        if let Err(e) = self.publisher.publish(report).await {
                            warn!("Failed to publish report: {}", e);
                        }
                    }
                }
            }
        }));

        handles
    }
}
