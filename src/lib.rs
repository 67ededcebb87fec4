//! # product-harvest
//!
//! Bulk fetcher for product detail APIs: resolves a large list of identifiers
//! under a concurrency cap, retries failed fetches with a fixed delay, and writes
//! successes as fixed-size JSON batches plus per-category error logs.
//!
//! ## Pipeline
//!
//! - [`fetcher`] - one HTTP request per identifier, mapped to a [`ProductRecord`]
//! - [`retry`] - fixed retry budget, last attempt's error category wins
//! - [`limiter`] - at most N identifiers in flight, four interchangeable strategies
//! - [`aggregator`] - single consumer that seals batches and tallies failures
//! - [`pipeline`] - [`Harvester`] wires everything and returns a [`Summary`]
//!
//! Every identifier yields exactly one [`Outcome`], so
//! `total_success + total_errors == identifiers.len()` holds for every run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use product_harvest::{Config, Harvester, ProductId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.fetch.concurrency = 20;
//!
//!     let harvester = Harvester::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let ids: Vec<ProductId> = (1..=100u64).map(ProductId::from).collect();
//!     let summary = harvester.run(ids).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch aggregation and persistence
pub mod aggregator;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Record fetching over HTTP
pub mod fetcher;
/// Worklist loading
pub mod input;
/// Bounded-concurrency scheduling
pub mod limiter;
/// Pipeline orchestration
pub mod pipeline;
/// Fixed-delay retry logic
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use aggregator::{BatchAggregator, BatchSink, ErrorLedger, FsBatchSink};
pub use config::{Config, ErrorLogFormat, Strategy};
pub use error::{Error, FetchError, Result};
pub use fetcher::{HttpRecordFetcher, RecordSource};
pub use input::load_identifiers;
pub use pipeline::Harvester;
pub use types::{ErrorCategory, Event, Outcome, ProductId, ProductRecord, Summary};
