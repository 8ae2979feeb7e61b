use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::AlertDispatcher;
use crate::extractor::{classify_availability, SnapshotExtractor};
use crate::models::{CheckOutcome, CheckRecord, CycleReport, Item};
use crate::registry::ItemRegistry;
use crate::scraper::SessionPool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub cycles_completed: u64,
    pub checks: u64,
    pub errors: u64,
    pub alerts_fired: u64,
    pub total_elapsed: Duration,
}

impl SchedulerStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles_completed += 1;
        self.checks += report.records.len() as u64;
        self.errors += report.errors() as u64;
        self.alerts_fired += report.alerts_fired() as u64;
        self.total_elapsed += report.elapsed;
    }

    pub fn average_cycle(&self) -> Duration {
        if self.cycles_completed == 0 {
            return Duration::ZERO;
        }
        self.total_elapsed / self.cycles_completed as u32
    }
}

/// Time left to wait after a cycle that took `elapsed`. Cycles that overrun
/// the interval start the next one immediately.
pub fn pacing_delay(elapsed: Duration, interval: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Drives monitoring cycles: every item checked once per cycle, at most one
/// check per pooled session at a time, then a pause to hold the cadence.
pub struct CycleScheduler {
    pool: Arc<SessionPool>,
    registry: Arc<ItemRegistry>,
    extractor: Arc<SnapshotExtractor>,
    dispatcher: Arc<AlertDispatcher>,
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(
        pool: Arc<SessionPool>,
        registry: Arc<ItemRegistry>,
        extractor: Arc<SnapshotExtractor>,
        dispatcher: Arc<AlertDispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            registry,
            extractor,
            dispatcher,
            interval,
        }
    }

    /// Run cycles until `cancel` fires. Cancellation is honoured between cycles
    /// and during the pause; a cycle in progress always completes.
    pub async fn run(&self, cancel: CancellationToken) -> SchedulerStats {
        info!(
            "Monitoring {} items with {} sessions every {:?}",
            self.registry.len(),
            self.pool.len(),
            self.interval
        );

        let mut stats = SchedulerStats::default();
        let mut cycle = 0;

        while !cancel.is_cancelled() {
            cycle += 1;
            let report = self.run_cycle(cycle).await;
            stats.record(&report);

            let delay = pacing_delay(report.elapsed, self.interval);
            if delay.is_zero() {
                debug!("Cycle {} overran the interval, starting next cycle now", cycle);
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!(
            "Scheduler stopped after {} cycles ({} alerts, avg cycle {:?})",
            stats.cycles_completed,
            stats.alerts_fired,
            stats.average_cycle()
        );
        stats
    }

    /// Check every registered item once and return the per-item records in
    /// registry order.
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let started_at = Utc::now();
        let start = Instant::now();

        // Every check starts at once and queues on its slot's lease, so each
        // session works through its own items back to back.
        let records = join_all((0..self.registry.len()).map(|index| self.check_index(index))).await;

        let elapsed = start.elapsed();
        histogram!("restock_cycle_seconds").record(elapsed.as_secs_f64());

        let report = CycleReport {
            cycle,
            started_at,
            records,
            elapsed,
        };
        log_report(&report);
        report
    }

    async fn check_index(&self, index: usize) -> CheckRecord {
        match self.registry.get(index) {
            Some(item) => self.check_item(index, item).await,
            None => CheckRecord {
                index,
                name: String::new(),
                status: None,
                error: Some(format!("no item registered at index {}", index)),
                alert_fired: false,
                response_time_ms: 0,
            },
        }
    }

    async fn check_item(&self, index: usize, item: &Item) -> CheckRecord {
        debug!("[{}] Pending: {}", index, item.short_name());
        let start = Instant::now();

        let outcome = self.fetch_and_extract(index, item).await;
        let transition = self.dispatcher.process(&self.registry, index, &outcome).await;
        counter!("restock_checks_total", "outcome" => outcome.label()).increment(1);

        let error = match &outcome {
            CheckOutcome::Failed { error } => Some(error.clone()),
            CheckOutcome::Extracted { .. } => None,
        };

        CheckRecord {
            index,
            name: item.short_name().to_string(),
            status: outcome.status(),
            error,
            alert_fired: transition.fires_alert(),
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn fetch_and_extract(&self, index: usize, item: &Item) -> CheckOutcome {
        let slot = self.pool.slot_for(index);
        let lease = match self.pool.acquire(slot).await {
            Ok(lease) => lease,
            Err(e) => return CheckOutcome::Failed { error: e.to_string() },
        };

        debug!("[{}] Fetching {} on session {}", index, item.url, lease.slot());
        match lease.open(&item.url).await {
            Ok(page) => {
                if page.final_url != page.requested_url {
                    debug!("[{}] Redirected to {}", index, page.final_url);
                }
                let status = classify_availability(&page);
                let snapshot = self.extractor.extract(&page, item);
                debug!(
                    "[{}] Extracted in {}ms: {} {}",
                    index,
                    page.response_time_ms,
                    status,
                    snapshot.formatted_price()
                );
                CheckOutcome::Extracted { status, snapshot }
            }
            Err(e) => {
                warn!("[{}] Failed: {}: {}", index, item.short_name(), e);
                CheckOutcome::Failed { error: e.to_string() }
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    for record in &report.records {
        let status = match (&record.status, &record.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(error)) => format!("ERROR ({})", error),
            (None, None) => "UNKNOWN".to_string(),
        };
        debug!(
            "  {:<30} {:<14} {:>6}ms{}",
            record.name,
            status,
            record.response_time_ms,
            if record.alert_fired { " 🔔" } else { "" }
        );
    }

    info!(
        "Cycle {} done in {:.2}s: {} in stock, {} out of stock, {} errors, {} alerts",
        report.cycle,
        report.elapsed.as_secs_f64(),
        report.in_stock(),
        report.out_of_stock(),
        report.errors(),
        report.alerts_fired()
    );
}
