use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NotificationsConfig;
use crate::models::{AlertPayload, CheckOutcome, Item, Snapshot, StockStatus};
use crate::plugins::traits::Notifier;
use crate::registry::ItemRegistry;

/// How an item's stored status moved after one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First successful observation of the item.
    Initial(StockStatus),
    Restocked,
    SoldOut,
    Unchanged(StockStatus),
    /// The check failed; the stored status was left as it was.
    Unknown,
}

impl Transition {
    pub fn fires_alert(self) -> bool {
        matches!(self, Transition::Restocked)
    }
}

/// Only an observed out-of-stock to in-stock move counts as a restock. An
/// unknown previous status never alerts.
pub fn classify_transition(previous: Option<StockStatus>, current: StockStatus) -> Transition {
    match (previous, current) {
        (None, status) => Transition::Initial(status),
        (Some(StockStatus::OutOfStock), StockStatus::InStock) => Transition::Restocked,
        (Some(StockStatus::InStock), StockStatus::OutOfStock) => Transition::SoldOut,
        (Some(_), status) => Transition::Unchanged(status),
    }
}

/// Applies check outcomes to the registry and sends an alert on every restock edge.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    notifications: NotificationsConfig,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, notifications: NotificationsConfig) -> Self {
        Self {
            notifier,
            notifications,
        }
    }

    pub async fn process(
        &self,
        registry: &ItemRegistry,
        index: usize,
        outcome: &CheckOutcome,
    ) -> Transition {
        let CheckOutcome::Extracted { status, snapshot } = outcome else {
            return Transition::Unknown;
        };
        let Some(item) = registry.get(index) else {
            warn!("Outcome for unknown item index {}", index);
            return Transition::Unknown;
        };

        let previous = registry.update_status(index, *status);
        let transition = classify_transition(previous, *status);

        if transition.fires_alert() {
            self.send_alert(item, snapshot).await;
        }

        transition
    }

    async fn send_alert(&self, item: &Item, snapshot: &Snapshot) {
        info!(
            "🚨 RESTOCK DETECTED: {} | {} | {}",
            item.name,
            snapshot.formatted_price(),
            snapshot.stock_level
        );
        counter!("restock_alerts_total").increment(1);

        let payload = AlertPayload::restock(item, snapshot, &self.notifications);
        let timeout = self.notifications.timeout();

        match tokio::time::timeout(timeout, self.notifier.notify(&payload)).await {
            Ok(Ok(_)) => {
                info!("Alert sent via {} for {}", self.notifier.name(), item.name);
            }
            Ok(Err(e)) => {
                counter!("restock_notify_failures_total").increment(1);
                warn!("Failed to send alert for {}: {}", item.name, e);
            }
            Err(_) => {
                counter!("restock_notify_failures_total").increment(1);
                warn!(
                    "Alert for {} timed out after {:?} via {}",
                    item.name,
                    timeout,
                    self.notifier.name()
                );
            }
        }
    }
}
