//! Core types for product-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier naming one remote record
///
/// Input files carry either integer or string keys, so the raw key is kept as text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a new ProductId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product as persisted in the success batches
///
/// Fields missing from the upstream response stay `None`/empty. `id` and `price`
/// are kept as the JSON values received, whatever their type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Upstream product id (integer or string)
    pub id: Option<serde_json::Value>,
    /// Product name
    pub name: Option<String>,
    /// URL slug
    pub url_key: Option<String>,
    /// Price, kept as the exact JSON value received
    pub price: Option<serde_json::Value>,
    /// Plain-text description (HTML stripped, whitespace collapsed)
    pub description: String,
    /// Image URLs in upstream order
    pub images: Vec<String>,
}

/// Classification of a terminal failure
///
/// Serialized as its tag (`status_404`, `exception`, `unknown`), which is also the
/// name of the category's error log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    /// Request completed with a non-2xx status
    Status(u16),
    /// Transport, timeout, or parse failure
    Exception,
    /// No attempt produced a recognizable category
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Status(code) => write!(f, "status_{code}"),
            ErrorCategory::Exception => f.write_str("exception"),
            ErrorCategory::Unknown => f.write_str("unknown"),
        }
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exception" => Ok(ErrorCategory::Exception),
            "unknown" => Ok(ErrorCategory::Unknown),
            other => other
                .strip_prefix("status_")
                .and_then(|code| code.parse().ok())
                .map(ErrorCategory::Status)
                .ok_or_else(|| format!("unrecognized error category: {other}")),
        }
    }
}

impl Serialize for ErrorCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Terminal result for one identifier after all retries
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A record was fetched
    Success {
        /// Identifier that was requested
        id: ProductId,
        /// The fetched record
        record: ProductRecord,
    },
    /// Every attempt failed
    Failure {
        /// Identifier that was requested
        id: ProductId,
        /// Category of the last attempt
        category: ErrorCategory,
    },
}

impl Outcome {
    /// Identifier this outcome belongs to
    pub fn id(&self) -> &ProductId {
        match self {
            Outcome::Success { id, .. } | Outcome::Failure { id, .. } => id,
        }
    }

    /// Whether this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Reconciled result of a pipeline run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of identifiers in the worklist
    pub attempted: usize,
    /// Identifiers that produced a record
    pub total_success: usize,
    /// Identifiers that failed every attempt
    pub total_errors: usize,
    /// Failure count per category
    pub per_category: BTreeMap<ErrorCategory, usize>,
    /// Number of batch files written
    pub batches_written: u32,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    /// Whether successes and errors account for every attempted identifier
    pub fn is_reconciled(&self) -> bool {
        self.total_success + self.total_errors == self.attempted
            && self.per_category.values().sum::<usize>() == self.total_errors
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "Total success: {}", self.total_success)?;
        writeln!(f, "Total errors: {}", self.total_errors)?;
        for (category, count) in &self.per_category {
            writeln!(f, "   - {category}: {count}")?;
        }
        write!(f, "Batches written: {}", self.batches_written)
    }
}

/// Events emitted during a run
///
/// Subscribe through [`Harvester::subscribe`](crate::Harvester::subscribe).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A record was fetched for this identifier
    Fetched {
        /// Identifier that succeeded
        id: ProductId,
    },
    /// This identifier failed every attempt
    Failed {
        /// Identifier that failed
        id: ProductId,
        /// Category of the last attempt
        category: ErrorCategory,
    },
    /// A batch file was sealed and written
    BatchSaved {
        /// Batch index, starting at 1
        index: u32,
        /// Number of records in the batch
        records: usize,
        /// File the batch was written to
        path: PathBuf,
    },
    /// The run finished
    Finished {
        /// Final accounting
        summary: Summary,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_tags() {
        assert_eq!(ErrorCategory::Status(404).to_string(), "status_404");
        assert_eq!(ErrorCategory::Exception.to_string(), "exception");
        assert_eq!(ErrorCategory::Unknown.to_string(), "unknown");
    }

    #[test]
    fn category_parses_its_own_tag() {
        for category in [
            ErrorCategory::Status(503),
            ErrorCategory::Exception,
            ErrorCategory::Unknown,
        ] {
            assert_eq!(category.to_string().parse::<ErrorCategory>(), Ok(category));
        }
        assert!("status_abc".parse::<ErrorCategory>().is_err());
        assert!("timeout".parse::<ErrorCategory>().is_err());
    }

    #[test]
    fn category_serializes_as_map_key() {
        let mut counts = BTreeMap::new();
        counts.insert(ErrorCategory::Status(404), 2usize);
        counts.insert(ErrorCategory::Exception, 1usize);

        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"status_404":2,"exception":1}"#);

        let back: BTreeMap<ErrorCategory, usize> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, counts);
    }

    #[test]
    fn record_keeps_non_ascii_and_exact_price() {
        let record: ProductRecord = serde_json::from_str(
            r#"{"id":7,"name":"Bình giữ nhiệt","url_key":"binh","price":125000,"description":"","images":[]}"#,
        )
        .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("Bình giữ nhiệt"));
        assert!(json.contains(r#""price":125000"#));
    }

    #[test]
    fn record_id_may_be_a_string() {
        let record: ProductRecord = serde_json::from_str(
            r#"{"id":"SKU-9","name":null,"url_key":null,"price":"12.5","description":"","images":[]}"#,
        )
        .unwrap();
        assert_eq!(record.id, Some(serde_json::json!("SKU-9")));
        assert_eq!(record.price, Some(serde_json::json!("12.5")));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""id":"SKU-9""#));
    }

    #[test]
    fn summary_display_lists_categories() {
        let now = Utc::now();
        let summary = Summary {
            attempted: 3,
            total_success: 2,
            total_errors: 1,
            per_category: BTreeMap::from([(ErrorCategory::Status(404), 1)]),
            batches_written: 1,
            started_at: now,
            finished_at: now,
        };
        assert!(summary.is_reconciled());
        let text = summary.to_string();
        assert!(text.contains("Total success: 2"));
        assert!(text.contains("Total errors: 1"));
        assert!(text.contains("   - status_404: 1"));
    }

    #[test]
    fn outcome_accessors() {
        let failure = Outcome::Failure {
            id: ProductId::from(2u64),
            category: ErrorCategory::Exception,
        };
        assert_eq!(failure.id().as_str(), "2");
        assert!(!failure.is_success());
    }
}
