//! Pipeline orchestration
//!
//! [`Harvester::run`] wires the limiter, retry driver and aggregator together:
//!
//! ```text
//! worklist -> run_bounded(resolve) -> outcome channel -> aggregator task -> Summary
//! ```

use crate::aggregator::{
    AggregateReport, BatchAggregator, BatchSink, FsBatchSink, OUTCOME_CHANNEL_BUFFER,
    spawn_aggregator,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{HttpRecordFetcher, RecordSource};
use crate::limiter::run_bounded;
use crate::retry::resolve;
use crate::types::{Event, Outcome, ProductId, Summary};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Bulk fetcher driving the whole pipeline
///
/// Cloning is cheap; clones share the record source and event channel.
#[derive(Clone)]
pub struct Harvester {
    config: Arc<Config>,
    source: Arc<dyn RecordSource>,
    event_tx: broadcast::Sender<Event>,
}

impl Harvester {
    /// Create a harvester fetching over HTTP
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpRecordFetcher::new(&config.api, config.fetch.concurrency)?;
        Ok(Self::with_source(config, Arc::new(fetcher)))
    }

    /// Create a harvester over any record source
    pub fn with_source(config: Config, source: Arc<dyn RecordSource>) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            source,
            event_tx,
        }
    }

    /// Subscribe to run events
    ///
    /// Slow subscribers may miss events (see [`broadcast::Receiver`]); the summary
    /// returned by [`run`](Self::run) is authoritative.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch every identifier and persist results under the configured output dirs
    pub async fn run(&self, ids: Vec<ProductId>) -> Result<Summary> {
        self.config.validate()?;
        let sink = FsBatchSink::prepare(&self.config.output).await?;
        self.run_with_sink(ids, sink).await
    }

    /// Fetch every identifier, persisting through `sink`
    ///
    /// Individual identifier failures never abort the run; only sink errors do.
    pub async fn run_with_sink<S>(&self, ids: Vec<ProductId>, sink: S) -> Result<Summary>
    where
        S: BatchSink + 'static,
    {
        let started_at = Utc::now();
        let attempted = ids.len();
        tracing::info!(
            identifiers = attempted,
            concurrency = self.config.fetch.concurrency,
            strategy = %self.config.fetch.strategy,
            max_attempts = self.config.retry.max_attempts,
            "Starting harvest"
        );

        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_BUFFER);
        let aggregator = BatchAggregator::new(sink, self.config.output.batch_size)
            .with_events(self.event_tx.clone());
        let aggregator_task = spawn_aggregator(aggregator, outcome_rx);

        let source = Arc::clone(&self.source);
        let retry = self.config.retry.clone();
        let mut outcomes = run_bounded(
            self.config.fetch.strategy,
            ids,
            self.config.fetch.concurrency,
            move |id| {
                let source = Arc::clone(&source);
                let retry = retry.clone();
                async move { resolve(source.as_ref(), &retry, id).await }
            },
        );

        let mut completed = 0usize;
        while let Some(outcome) = outcomes.next().await {
            completed += 1;
            self.report_progress(&outcome, completed, attempted);
            if outcome_tx.send(outcome).await.is_err() {
                // The aggregator only hangs up after a persistence error
                break;
            }
        }
        drop(outcome_tx);

        let report = aggregator_task
            .await
            .map_err(|e| Error::Aggregator(format!("aggregator task failed: {e}")))??;

        let summary = build_summary(attempted, report, started_at)?;
        tracing::info!(
            success = summary.total_success,
            errors = summary.total_errors,
            batches = summary.batches_written,
            "Harvest finished"
        );

        self.event_tx
            .send(Event::Finished {
                summary: summary.clone(),
            })
            .ok();
        Ok(summary)
    }

    fn report_progress(&self, outcome: &Outcome, completed: usize, attempted: usize) {
        let event = match outcome {
            Outcome::Success { id, .. } => {
                tracing::debug!(product_id = %id, completed, attempted, "Success fetch");
                Event::Fetched { id: id.clone() }
            }
            Outcome::Failure { id, category } => {
                tracing::info!(product_id = %id, %category, completed, attempted, "Fetch failed");
                Event::Failed {
                    id: id.clone(),
                    category: *category,
                }
            }
        };
        self.event_tx.send(event).ok();
    }
}

/// Fails with [`Error::Incomplete`] unless every identifier is accounted for
fn build_summary(
    attempted: usize,
    report: AggregateReport,
    started_at: chrono::DateTime<Utc>,
) -> Result<Summary> {
    let summary = Summary {
        attempted,
        total_success: report.successes,
        total_errors: report.ledger.total(),
        per_category: report.ledger.counts(),
        batches_written: report.batches_written(),
        started_at,
        finished_at: Utc::now(),
    };
    if !summary.is_reconciled() {
        tracing::error!(
            attempted,
            success = summary.total_success,
            errors = summary.total_errors,
            "Harvest totals do not reconcile"
        );
        return Err(Error::Incomplete {
            attempted,
            resolved: summary.total_success + summary.total_errors,
        });
    }
    Ok(summary)
}
