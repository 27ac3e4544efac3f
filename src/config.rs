use config::{Config, ConfigError, Environment, File};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub products_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub title_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub fraction_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub item_delay_secs: u64,
    pub cycle_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Connection timeout in seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    /// When set, tracing output goes to a daily-rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                products_file: "products.csv".to_string(),
            },
            scraper: ScraperConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationsConfig {
                smtp: SmtpConfig {
                    host: "smtp.gmail.com".to_string(),
                    port: 465,
                    timeout: 30,
                },
            },
            logging: LoggingConfig {
                filter: "deal_hunter=info".to_string(),
                directory: None,
            },
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            title_selectors: ["#productTitle", "h1.product-title", "h1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            price_selectors: [
                ".a-price-whole",
                "span.a-price-whole",
                "span.price-tag",
                ".priceToPay",
                "#price",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fraction_selector: ".a-price-fraction".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            item_delay_secs: 5,
            cycle_delay_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Coded defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // DEALHUNTER_SERVER__PORT=9000 etc.
            .add_source(
                Environment::with_prefix("DEALHUNTER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scraper.title_selectors")
                    .with_list_parse_key("scraper.price_selectors"),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.storage.products_file.trim().is_empty() {
            return Err(ConfigError::Message("Storage products_file must not be empty".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.title_selectors.is_empty() {
            return Err(ConfigError::Message("Scraper title_selectors must not be empty".into()));
        }

        if self.scraper.price_selectors.is_empty() {
            return Err(ConfigError::Message("Scraper price_selectors must not be empty".into()));
        }

        let all_selectors = self
            .scraper
            .title_selectors
            .iter()
            .chain(self.scraper.price_selectors.iter())
            .chain(std::iter::once(&self.scraper.fraction_selector));
        for selector in all_selectors {
            if Selector::parse(selector).is_err() {
                return Err(ConfigError::Message(format!("Invalid CSS selector: '{}'", selector)));
            }
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.notifications.smtp.host.trim().is_empty() {
            return Err(ConfigError::Message("SMTP host must not be empty".into()));
        }

        Ok(())
    }
}
