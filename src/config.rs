use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub scraper: ScraperConfig,
    pub extraction: ExtractionConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub items: Vec<ItemConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Number of browser sessions, which is also the per-cycle concurrency bound.
    pub pool_size: usize,
    /// Target time between cycle starts.
    pub check_interval_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub page_load_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub chrome_path: Option<String>,
    pub user_agents: Vec<String>,
    pub block_resources: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub media_host: String,
    pub default_cart_limit: u32,
    pub category_limits: Vec<CategoryLimit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryLimit {
    pub keywords: Vec<String>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub timeout_secs: u64,
    /// Template for the "open in app" deep link. `{id}` is the item id.
    pub app_link: Option<String>,
    pub links: Vec<LinkTemplate>,
    pub discord: DiscordConfig,
}

/// A labelled link attached to every alert. Placeholders: `{id}`, `{url}`, `{query}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkTemplate {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub color: u32,
    pub mention_everyone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemConfig {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub cart_limit: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            check_interval_secs: 2.0,
        }
    }
}

impl MonitorConfig {
    /// Saturates for values `validate` would reject.
    pub fn check_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.check_interval_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_secs: 10,
            settle_delay_ms: 1500,
            chrome_path: None,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
            block_resources: true,
        }
    }
}

impl ScraperConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// User agent for a pool slot, rotating through the configured list.
    pub fn user_agent_for_slot(&self, slot: usize) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        Some(self.user_agents[slot % self.user_agents.len()].as_str())
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            media_host: "target.scene7.com".to_string(),
            default_cart_limit: 10,
            category_limits: vec![
                CategoryLimit {
                    keywords: vec![
                        "pokemon".to_string(),
                        "pokémon".to_string(),
                        "trading card".to_string(),
                    ],
                    limit: 20,
                },
                CategoryLimit {
                    keywords: vec![
                        "playstation".to_string(),
                        "xbox".to_string(),
                        "nintendo".to_string(),
                        "console".to_string(),
                    ],
                    limit: 2,
                },
            ],
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3,
            app_link: Some("https://target.com/p/-/A-{id}".to_string()),
            links: vec![
                LinkTemplate {
                    label: "Cart".to_string(),
                    url: "https://www.target.com/cart".to_string(),
                },
                LinkTemplate {
                    label: "Lightning".to_string(),
                    url: "https://www.target.com/c/target-deals/-/N-4ttke".to_string(),
                },
                LinkTemplate {
                    label: "Mobile".to_string(),
                    url: "https://target.com/p/-/A-{id}".to_string(),
                },
                LinkTemplate {
                    label: "Ebay".to_string(),
                    url: "https://www.ebay.com/sch/i.html?_nkw={query}".to_string(),
                },
                LinkTemplate {
                    label: "Ebay Sales".to_string(),
                    url: "https://www.ebay.com/sch/i.html?_nkw={query}&LH_Sold=1&LH_Complete=1"
                        .to_string(),
                },
            ],
            discord: DiscordConfig::default(),
        }
    }
}

impl NotificationsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: None,
            avatar_url: None,
            author_name: "Restock Watcher".to_string(),
            author_icon_url: None,
            color: 0xCC0000,
            mention_everyone: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            json: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

/// Command-line values layered over every file and environment source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub check_interval_secs: Option<f64>,
    pub pool_size: Option<usize>,
}

impl AppConfig {
    /// Layered load: `config/default`, `config/{RUN_MODE}`, `config/local`, an
    /// optional explicit file, `RESTOCK__*` environment variables, then
    /// `overrides`. Validation runs once on the merged result.
    pub fn load(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        let s = builder
            .add_source(
                Environment::with_prefix("RESTOCK")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("monitor.check_interval_secs", overrides.check_interval_secs)?
            .set_override_option("monitor.pool_size", overrides.pool_size.map(|n| n as u64))?
            .build()?;

        Self::finish(s)
    }

    /// Parse a TOML document without touching the filesystem or environment.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::finish(s)
    }

    fn finish(s: Config) -> Result<Self, ConfigError> {
        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.pool_size == 0 {
            return Err(ConfigError::Message("Monitor pool_size must be greater than 0".into()));
        }

        let interval = self.monitor.check_interval_secs;
        if interval <= 0.0 || Duration::try_from_secs_f64(interval).is_err() {
            return Err(ConfigError::Message(format!(
                "Monitor check_interval_secs must be a positive number of seconds, got {}",
                interval
            )));
        }

        if self.scraper.page_load_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Scraper page_load_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.extraction.default_cart_limit == 0 {
            return Err(ConfigError::Message(
                "Extraction default_cart_limit must be greater than 0".into(),
            ));
        }

        if self.extraction.category_limits.iter().any(|c| c.limit == 0 || c.keywords.is_empty()) {
            return Err(ConfigError::Message(
                "Extraction category_limits need at least one keyword and a limit above 0".into(),
            ));
        }

        if self.notifications.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Notification timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            if Url::parse(webhook).is_err() {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        if self.items.is_empty() {
            return Err(ConfigError::Message("At least one item must be configured".into()));
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(ConfigError::Message(format!("Item {} has an empty name", item.url)));
            }
            if Url::parse(&item.url).is_err() {
                return Err(ConfigError::Message(format!("Invalid item URL: {}", item.url)));
            }
            if item.cart_limit == Some(0) {
                return Err(ConfigError::Message(format!(
                    "Item {} has a cart_limit of 0",
                    item.name
                )));
            }
            if !seen.insert(item.url.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate item URL: {}", item.url)));
            }
        }

        Ok(())
    }
}
