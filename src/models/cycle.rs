use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::item::StockStatus;
use super::snapshot::Snapshot;

/// Result of checking one item in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Extracted { status: StockStatus, snapshot: Snapshot },
    /// Fetch or render failure. The item's status is unknown this cycle.
    Failed { error: String },
}

impl CheckOutcome {
    pub fn status(&self) -> Option<StockStatus> {
        match self {
            CheckOutcome::Extracted { status, .. } => Some(*status),
            CheckOutcome::Failed { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckOutcome::Extracted { status: StockStatus::InStock, .. } => "in_stock",
            CheckOutcome::Extracted { status: StockStatus::OutOfStock, .. } => "out_of_stock",
            CheckOutcome::Failed { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub index: usize,
    pub name: String,
    pub status: Option<StockStatus>,
    pub error: Option<String>,
    pub alert_fired: bool,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub records: Vec<CheckRecord>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn in_stock(&self) -> usize {
        self.count_status(StockStatus::InStock)
    }

    pub fn out_of_stock(&self) -> usize {
        self.count_status(StockStatus::OutOfStock)
    }

    pub fn errors(&self) -> usize {
        self.records.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn alerts_fired(&self) -> usize {
        self.records.iter().filter(|r| r.alert_fired).count()
    }

    fn count_status(&self, status: StockStatus) -> usize {
        self.records.iter().filter(|r| r.status == Some(status)).count()
    }
}
