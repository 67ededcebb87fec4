//! Batch aggregation and persistence
//!
//! The aggregator is the only owner of the open batch and the error ledger. It
//! runs as a single consumer of an outcome channel (see [`spawn_aggregator`]), so
//! producers never touch shared state.

use crate::config::{ErrorLogFormat, OutputConfig};
use crate::error::{Error, Result};
use crate::types::{ErrorCategory, Event, Outcome, ProductId, ProductRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};

/// Buffer size of the outcome channel feeding the aggregator
pub const OUTCOME_CHANNEL_BUFFER: usize = 1024;

/// Name of the per-category file written in [`ErrorLogFormat::Json`] mode
pub const JSON_ERROR_LOG_NAME: &str = "error_async_products.json";

/// Failing identifiers grouped by category
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorLedger {
    entries: BTreeMap<ErrorCategory, Vec<ProductId>>,
}

impl ErrorLedger {
    /// Record one terminal failure
    pub fn record(&mut self, category: ErrorCategory, id: ProductId) {
        self.entries.entry(category).or_default().push(id);
    }

    /// Number of failures in a category
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.entries.get(&category).map_or(0, Vec::len)
    }

    /// Failures across all categories
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Failure count per category
    pub fn counts(&self) -> BTreeMap<ErrorCategory, usize> {
        self.entries
            .iter()
            .map(|(category, ids)| (*category, ids.len()))
            .collect()
    }

    /// Identifiers that failed with `category`, in arrival order
    pub fn ids(&self, category: ErrorCategory) -> &[ProductId] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate categories with their failing identifiers
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorCategory, &Vec<ProductId>)> {
        self.entries.iter()
    }

    /// Whether no failure has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where sealed batches and error logs go
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    /// Persist a sealed batch, returning where it was written
    async fn write_batch(&self, index: u32, records: &[ProductRecord]) -> Result<PathBuf>;

    /// Persist one terminal failure as it arrives
    async fn record_failure(&self, category: ErrorCategory, id: &ProductId) -> Result<()>;

    /// Called once after the last outcome
    async fn finish(&self, ledger: &ErrorLedger) -> Result<()>;
}

/// [`BatchSink`] writing JSON batch files and per-category error logs to disk
#[derive(Clone, Debug)]
pub struct FsBatchSink {
    success_dir: PathBuf,
    error_dir: PathBuf,
    format: ErrorLogFormat,
}

impl FsBatchSink {
    /// Create the output directories and return a sink writing into them
    pub async fn prepare(config: &OutputConfig) -> Result<Self> {
        for dir in [&config.success_dir, &config.error_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| Error::OutputDir {
                    path: dir.clone(),
                    source,
                })?;
        }

        Ok(Self {
            success_dir: config.success_dir.clone(),
            error_dir: config.error_dir.clone(),
            format: config.error_log_format,
        })
    }

    /// Path of the batch file for `index`
    pub fn batch_path(&self, index: u32) -> PathBuf {
        batch_file_path(&self.success_dir, index)
    }

    /// Path of the error log for `category`
    pub fn error_log_path(&self, category: ErrorCategory) -> PathBuf {
        error_log_path(&self.error_dir, self.format, category)
    }
}

/// `<dir>/products_<index>.json`
pub fn batch_file_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("products_{index}.json"))
}

/// Location of a category's error log for the given layout
pub fn error_log_path(dir: &Path, format: ErrorLogFormat, category: ErrorCategory) -> PathBuf {
    match format {
        ErrorLogFormat::Lines => dir.join(format!("{category}.txt")),
        ErrorLogFormat::Json => dir.join(category.to_string()).join(JSON_ERROR_LOG_NAME),
    }
}

#[async_trait::async_trait]
impl BatchSink for FsBatchSink {
    async fn write_batch(&self, index: u32, records: &[ProductRecord]) -> Result<PathBuf> {
        let path = self.batch_path(index);
        let json = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    async fn record_failure(&self, category: ErrorCategory, id: &ProductId) -> Result<()> {
        if self.format != ErrorLogFormat::Lines {
            return Ok(());
        }

        let path = self.error_log_path(category);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("{id}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn finish(&self, ledger: &ErrorLedger) -> Result<()> {
        if self.format != ErrorLogFormat::Json {
            return Ok(());
        }

        for (category, ids) in ledger.iter() {
            let path = self.error_log_path(*category);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let entries: Vec<_> = ids
                .iter()
                .map(|id| serde_json::json!({ "id": id }))
                .collect();
            tokio::fs::write(&path, serde_json::to_vec_pretty(&entries)?).await?;
            tracing::debug!(%category, path = %path.display(), count = ids.len(), "Wrote error log");
        }
        Ok(())
    }
}

/// Final state of the aggregator after the last outcome
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateReport {
    /// Records persisted across all batches
    pub successes: usize,
    /// Terminal failures by category
    pub ledger: ErrorLedger,
    /// Batch files in index order
    pub batch_files: Vec<PathBuf>,
}

impl AggregateReport {
    /// Number of sealed batches
    pub fn batches_written(&self) -> u32 {
        u32::try_from(self.batch_files.len()).unwrap_or(u32::MAX)
    }
}

/// Groups successes into fixed-size batches and tallies failures
pub struct BatchAggregator<S> {
    sink: S,
    batch_size: usize,
    open: Vec<ProductRecord>,
    report: AggregateReport,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl<S: BatchSink> BatchAggregator<S> {
    /// Create an aggregator sealing batches of `batch_size` records (minimum 1)
    pub fn new(sink: S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            open: Vec::with_capacity(batch_size),
            report: AggregateReport::default(),
            event_tx: None,
        }
    }

    /// Emit [`Event::BatchSaved`] on this channel
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Consume one terminal outcome
    pub async fn ingest(&mut self, outcome: Outcome) -> Result<()> {
        match outcome {
            Outcome::Success { record, .. } => {
                self.open.push(record);
                if self.open.len() >= self.batch_size {
                    self.seal().await?;
                }
            }
            Outcome::Failure { id, category } => {
                self.sink.record_failure(category, &id).await?;
                self.report.ledger.record(category, id);
            }
        }
        Ok(())
    }

    /// Flush the open batch (if any) and return the final report
    pub async fn finish(mut self) -> Result<AggregateReport> {
        if !self.open.is_empty() {
            self.seal().await?;
        }
        self.sink.finish(&self.report.ledger).await?;
        Ok(self.report)
    }

    /// Records waiting in the open batch
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    async fn seal(&mut self) -> Result<()> {
        let index = self.report.batches_written() + 1;
        let records = std::mem::replace(&mut self.open, Vec::with_capacity(self.batch_size));
        let path = self.sink.write_batch(index, &records).await?;

        tracing::info!(batch = index, records = records.len(), path = %path.display(), "Saved batch");
        if let Some(tx) = &self.event_tx {
            tx.send(Event::BatchSaved {
                index,
                records: records.len(),
                path: path.clone(),
            })
            .ok();
        }

        self.report.successes += records.len();
        self.report.batch_files.push(path);
        Ok(())
    }
}

/// Run an aggregator as the single consumer of `outcome_rx`
///
/// The task ends when every sender is dropped, after flushing the last batch. A
/// persistence error ends it early; the receiver is dropped so producers see
/// their sends fail.
pub fn spawn_aggregator<S>(
    mut aggregator: BatchAggregator<S>,
    mut outcome_rx: mpsc::Receiver<Outcome>,
) -> tokio::task::JoinHandle<Result<AggregateReport>>
where
    S: BatchSink + 'static,
{
    tokio::spawn(async move {
        while let Some(outcome) = outcome_rx.recv().await {
            if let Err(e) = aggregator.ingest(outcome).await {
                tracing::error!(error = %e, "Failed to persist outcome, stopping aggregation");
                return Err(e);
            }
        }
        aggregator.finish().await
    })
}
