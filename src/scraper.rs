use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Chrome drops its DevTools connection after this long without events.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedPage {
    pub requested_url: String,
    pub final_url: String, // After redirects
    pub title: String,
    pub html: String,
    pub response_time_ms: u64,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            requested_url: url,
            title: title.into(),
            html: html.into(),
            response_time_ms: 0,
        }
    }
}

/// Sub-resources a status check never needs.
pub const BLOCKED_RESOURCES: [ResourceType; 3] =
    [ResourceType::Stylesheet, ResourceType::Image, ResourceType::Font];

/// Fetch-domain patterns that pause every blocked resource before it is requested.
pub fn blocked_request_patterns() -> Vec<RequestPattern> {
    BLOCKED_RESOURCES
        .iter()
        .map(|resource| RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_Type: Some(resource.clone()),
            request_stage: Some(RequestStage::Request),
        })
        .collect()
}

fn block_resources(tab: &Tab) -> Result<()> {
    let patterns = blocked_request_patterns();
    tab.enable_fetch(Some(patterns.as_slice()), None)
        .map_err(|e| AppError::Browser(format!("Failed to enable request interception: {}", e)))?;

    tab.enable_request_interception(Arc::new(
        |_transport: Arc<Transport>, _session_id: SessionId, paused: RequestPausedEvent| {
            RequestPausedDecision::Fail(FailRequest {
                request_id: paused.params.request_id,
                error_reason: ErrorReason::BlockedByClient,
            })
        },
    ))
    .map_err(|e| AppError::Browser(format!("Failed to install request interceptor: {}", e)))
}

/// One reusable rendering capability. Implementations must bound `open` by their
/// own page-load timeout.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn open(&self, url: &str) -> Result<RenderedPage>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct ChromeSession {
    slot: usize,
    tab: Arc<Tab>,
    settle_delay: Duration,
    // Dropping the browser terminates the Chrome process.
    _browser: Browser,
}

impl ChromeSession {
    /// Launch a headless Chrome with one reusable tab. Blocking.
    pub fn launch(slot: usize, config: &ScraperConfig) -> Result<Self> {
        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-plugins"),
            OsStr::new("--disable-software-rasterizer"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-background-timer-throttling"),
            OsStr::new("--disable-backgrounding-occluded-windows"),
            OsStr::new("--disable-renderer-backgrounding"),
        ];
        if config.block_resources {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(config.page_load_timeout());

        if config.block_resources {
            block_resources(&tab)?;
        }

        if let Some(user_agent) = config.user_agent_for_slot(slot) {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| AppError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        Ok(Self {
            slot,
            tab,
            settle_delay: config.settle_delay(),
            _browser: browser,
        })
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn open(&self, url: &str) -> Result<RenderedPage> {
        let start_time = Instant::now();

        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&target)
                .map_err(|e| AppError::navigation(target.as_str(), e))?;
            tab.wait_until_navigated()
                .map_err(|e| AppError::navigation(target.as_str(), e))?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Navigation task failed: {}", e)))??;

        // Let client-side rendering settle before reading the DOM
        tokio::time::sleep(self.settle_delay).await;

        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        let (html, title, final_url) = tokio::task::spawn_blocking(move || -> Result<_> {
            let html = tab
                .get_content()
                .map_err(|e| AppError::navigation(target.as_str(), format!("Failed to get page content: {}", e)))?;
            let title = tab.get_title().unwrap_or_default();
            let final_url = tab.get_url();
            Ok((html, title, final_url))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Content task failed: {}", e)))??;

        debug!(slot = self.slot, url, bytes = html.len(), "Page rendered");

        Ok(RenderedPage {
            requested_url: url.to_string(),
            final_url: if final_url.is_empty() { url.to_string() } else { final_url },
            title,
            html,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.close(false).map(|_| ()))
            .await
            .map_err(|e| AppError::Internal(format!("Close task failed: {}", e)))?
            .map_err(|e| AppError::Browser(format!("Failed to close tab: {}", e)))
    }
}

pub type SessionBox = Box<dyn PageSession>;

/// Fixed set of sessions, each behind its own lock so a slot is never shared by two
/// in-flight checks.
pub struct SessionPool {
    slots: Vec<Arc<Mutex<SessionBox>>>,
    closed: AtomicBool,
}

/// Exclusive access to one pool slot. Released on drop.
pub struct SessionLease {
    slot: usize,
    guard: OwnedMutexGuard<SessionBox>,
}

impl SessionLease {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Deref for SessionLease {
    type Target = dyn PageSession;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl SessionPool {
    pub fn new(sessions: Vec<SessionBox>) -> Result<Self> {
        if sessions.is_empty() {
            return Err(AppError::Validation("Session pool needs at least one session".into()));
        }

        Ok(Self {
            slots: sessions.into_iter().map(|s| Arc::new(Mutex::new(s))).collect(),
            closed: AtomicBool::new(false),
        })
    }

    /// Launch `size` Chrome sessions up front so cycles never pay startup cost.
    pub async fn launch(size: usize, config: &ScraperConfig) -> Result<Self> {
        info!("Initializing {} browser instances...", size);

        let launches = (0..size).map(|slot| {
            let config = config.clone();
            async move {
                let session = tokio::task::spawn_blocking(move || ChromeSession::launch(slot, &config))
                    .await
                    .map_err(|e| AppError::Internal(format!("Browser launch task failed: {}", e)))??;
                info!("Browser {}/{} ready", slot + 1, size);
                Ok::<SessionBox, AppError>(Box::new(session))
            }
        });

        let sessions = futures::future::try_join_all(launches).await?;
        Self::new(sessions)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Round-robin slot for the item at `index`.
    pub fn slot_for(&self, index: usize) -> usize {
        index % self.slots.len()
    }

    /// Wait for exclusive use of `slot`.
    pub async fn acquire(&self, slot: usize) -> Result<SessionLease> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Internal("Session pool has been released".into()));
        }

        let cell = self.slots.get(slot).ok_or_else(|| {
            AppError::Internal(format!("Slot {} out of range for pool of {}", slot, self.slots.len()))
        })?;

        let guard = Arc::clone(cell).lock_owned().await;
        Ok(SessionLease { slot, guard })
    }

    /// Close every session. Waits for outstanding leases to be dropped.
    pub async fn release_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for (slot, cell) in self.slots.iter().enumerate() {
            let session = cell.lock().await;
            if let Err(e) = session.close().await {
                warn!(slot, "Error closing session: {}", e);
            }
        }

        info!("All {} sessions released", self.slots.len());
    }

    pub fn is_released(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
