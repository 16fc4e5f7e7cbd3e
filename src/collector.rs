//! Aggregator-side reconciliation.
//!
//! The [`Collector`] keeps the reports published over a rolling window and
//! merges them on read. Writers are serialized by the lock; a reader either
//! sees a report or it does not, never half of one.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::probe::Publisher;
use crate::report::Report;

pub struct Collector {
    window: Duration,
    reports: RwLock<VecDeque<(Instant, Report)>>,
}

impl Collector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            reports: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn add(&self, report: Report) {
        self.add_at(report, Instant::now()).await;
    }

    /// Records `report` as arriving at `now` and drops reports that have
    /// left the window.
    pub async fn add_at(&self, report: Report, now: Instant) {
        let mut reports = self.reports.write().await;
        reports.push_back((now, report));
        while let Some((at, _)) = reports.front() {
            if now.saturating_duration_since(*at) <= self.window {
                break;
            }
            reports.pop_front();
        }
        debug!("Collector holds {} reports", reports.len());
    }

    /// The merge of every report in the window.
    pub async fn report(&self) -> Report {
        self.report_at(Instant::now()).await
    }

    pub async fn report_at(&self, now: Instant) -> Report {
        self.reports
            .read()
            .await
            .iter()
            .filter(|(at, _)| now.saturating_duration_since(*at) <= self.window)
            .fold(Report::new(), |acc, (_, r)| acc.merged(r.clone()))
    }
}

#[async_trait]
impl Publisher for Collector {
    async fn publish(&self, report: Report) -> anyhow::Result<()> {
        self.add(report).await;
        Ok(())
    }
}
