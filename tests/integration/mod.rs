// Integration tests for Restock Watcher
// Shared fakes: a scripted page store behind fake browser sessions and a
// notifier that records every alert it receives.

pub mod monitor_cycle_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use restock_watcher::config::{ExtractionConfig, NotificationsConfig};
use restock_watcher::dispatcher::AlertDispatcher;
use restock_watcher::extractor::SnapshotExtractor;
use restock_watcher::models::{AlertPayload, Item};
use restock_watcher::plugins::{NotificationResult, Notifier};
use restock_watcher::registry::ItemRegistry;
use restock_watcher::scheduler::CycleScheduler;
use restock_watcher::scraper::{PageSession, RenderedPage, SessionBox, SessionPool};
use restock_watcher::{AppError, Result};

pub const SOLD_OUT_PAGE: &str =
    r#"<h1>Product</h1><span>$24.99</span><p>Sold out</p><button disabled>Add to cart</button>"#;

pub fn restock_page(price: &str, stock_line: &str) -> String {
    format!(
        r#"<h1>Product</h1><span>{}</span><p>{}</p><img src="//target.scene7.com/is/image/Target/GUEST_1"><button>Add to cart</button>"#,
        price, stock_line
    )
}

pub fn item_url(n: usize) -> String {
    format!("https://www.target.com/p/-/A-{}", n)
}

#[derive(Default)]
struct StoreInner {
    pages: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    opens: AtomicUsize,
    overlaps: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// What the fake "web" serves. URLs without a page fail to load.
#[derive(Clone, Default)]
pub struct PageStore {
    inner: Arc<StoreInner>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, html: impl Into<String>) {
        self.inner.pages.lock().unwrap().insert(url.to_string(), html.into());
    }

    pub fn remove(&self, url: &str) {
        self.inner.pages.lock().unwrap().remove(url);
    }

    pub fn set_delay(&self, url: &str, delay: Duration) {
        self.inner.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Times a session was asked to load a page while already loading one.
    pub fn overlaps(&self) -> usize {
        self.inner.overlaps.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    store: PageStore,
    busy: AtomicBool,
}

impl FakeSession {
    pub fn new(store: PageStore) -> Self {
        Self {
            store,
            busy: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn open(&self, url: &str) -> Result<RenderedPage> {
        let inner = &self.store.inner;
        inner.opens.fetch_add(1, Ordering::SeqCst);
        if self.busy.swap(true, Ordering::SeqCst) {
            inner.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = inner.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let html = inner.pages.lock().unwrap().get(url).cloned();

        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);

        html.map(|html| RenderedPage::new(url, "Target", html))
            .ok_or_else(|| AppError::navigation(url, "net::ERR_TIMED_OUT"))
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<AlertPayload>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<AlertPayload> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn alerts(&self) -> Vec<AlertPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|a| a.item_id.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, alert: &AlertPayload) -> Result<NotificationResult> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(NotificationResult::delivered(None))
    }
}

pub struct Monitor {
    pub scheduler: CycleScheduler,
    pub registry: Arc<ItemRegistry>,
    pub pool: Arc<SessionPool>,
}

/// `item_count` items named "Item N" at [`item_url`] checked by `pool_size`
/// fake sessions on a 2s interval.
pub fn build_monitor(
    item_count: usize,
    pool_size: usize,
    store: PageStore,
    notifier: RecordingNotifier,
) -> anyhow::Result<Monitor> {
    let items = (0..item_count)
        .map(|n| Item::new(item_url(n), format!("Item {}", n), None))
        .collect();
    build_monitor_with(
        items,
        pool_size,
        store,
        Arc::new(notifier),
        NotificationsConfig::default(),
    )
}

pub fn build_monitor_with(
    items: Vec<Item>,
    pool_size: usize,
    store: PageStore,
    notifier: Arc<dyn Notifier>,
    notifications: NotificationsConfig,
) -> anyhow::Result<Monitor> {
    let sessions = (0..pool_size)
        .map(|_| Box::new(FakeSession::new(store.clone())) as SessionBox)
        .collect();
    let pool = Arc::new(SessionPool::new(sessions)?);
    let registry = Arc::new(ItemRegistry::new(items));
    let extractor = Arc::new(SnapshotExtractor::new(&ExtractionConfig::default())?);
    let dispatcher = Arc::new(AlertDispatcher::new(notifier, notifications));

    let scheduler = CycleScheduler::new(
        Arc::clone(&pool),
        Arc::clone(&registry),
        extractor,
        dispatcher,
        Duration::from_secs(2),
    );

    Ok(Monitor {
        scheduler,
        registry,
        pool,
    })
}
