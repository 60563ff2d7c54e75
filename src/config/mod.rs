//! Process configuration loaded from the environment.

use crate::dealer::listings::EnumerateOptions;
use crate::scraper::batch::ScanOptions;
use anyhow::Context;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use url::Url;

/// Accepted page sizes for the inventory feed.
pub const PAGE_SIZE_RANGE: RangeInclusive<u32> = 12..=100;
/// Accepted number of feed pages to walk per scan.
pub const MAX_PAGES_RANGE: RangeInclusive<u32> = 1..=50;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Postgres connection string. Only required by the services and `refresh`.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// When set, mutating API routes require `Authorization: Bearer <token>`.
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_dealer_base_url")]
    pub dealer_base_url: String,
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u32,
    #[serde(default = "default_scan_max_pages")]
    pub scan_max_pages: u32,
    #[serde(
        default = "default_scan_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub scan_interval: Duration,
    #[serde(
        default = "default_scan_page_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub scan_page_delay: Duration,
    #[serde(
        default = "default_scan_detail_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub scan_detail_delay: Duration,
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_scan_on_startup")]
    pub scan_on_startup: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_dealer_base_url() -> String {
    "https://www.sportscarla.com".to_string()
}

fn default_scan_page_size() -> u32 {
    36
}

fn default_scan_max_pages() -> u32 {
    25
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_scan_page_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_scan_detail_delay() -> Duration {
    Duration::from_millis(150)
}

fn default_scan_concurrency() -> usize {
    4
}

fn default_scan_on_startup() -> bool {
    true
}

impl Config {
    /// Extract the configuration from raw (unprefixed) environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Self = figment.extract().context("Failed to load config")?;
        check_range("SCAN_PAGE_SIZE", config.scan_page_size, &PAGE_SIZE_RANGE)
            .map_err(anyhow::Error::msg)?;
        check_range("SCAN_MAX_PAGES", config.scan_max_pages, &MAX_PAGES_RANGE)
            .map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn dealer_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.dealer_base_url)
            .with_context(|| format!("Invalid DEALER_BASE_URL: {}", self.dealer_base_url))
    }

    /// Scan options from config, optionally overriding the page size and page limit.
    pub fn scan_options_with(&self, page_size: Option<u32>, max_pages: Option<u32>) -> ScanOptions {
        ScanOptions {
            enumerate: EnumerateOptions {
                page_size: page_size.unwrap_or(self.scan_page_size).max(1),
                max_pages: max_pages.unwrap_or(self.scan_max_pages),
                page_delay: self.scan_page_delay,
            },
            detail_delay: self.scan_detail_delay,
            concurrency: self.scan_concurrency.max(1),
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        self.scan_options_with(None, None)
    }
}

/// Reject `value` unless it lies in `range`.
pub fn check_range(name: &str, value: u32, range: &RangeInclusive<u32>) -> Result<u32, String> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "{name} must be between {} and {}",
            range.start(),
            range.end()
        ))
    }
}

/// Parse a human duration like `"250ms"`, `"1h"` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ]);
    let parsed = parser.parse(raw.trim()).map_err(|e| e.to_string())?;
    Duration::try_from(parsed).map_err(|e| e.to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration string like \"30s\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
