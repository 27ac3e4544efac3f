use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::ScraperConfig;
use crate::element_finder::{element_text, ElementFinder};
use crate::models::{CheckFailure, PriceCheck, TITLE_NOT_FOUND};
use crate::plugins::traits::TrackerPlugin;
use crate::scraper::{ScrapeError, WebScraper};
use crate::utils::error::{AppError, Result};

/// Markers of a bot-check interstitial rather than a product page.
const BLOCKING_MARKERS: &str = r"(?i)captcha|api-services-support-pipeline";

/// Pulls a title and a price out of a product page using ordered fallback selectors.
#[derive(Debug, Clone)]
pub struct PriceExtractor {
    title_finder: ElementFinder,
    price_finder: ElementFinder,
    fraction_selector: Selector,
    blocking_regex: Regex,
}

impl PriceExtractor {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let fraction_selector = Selector::parse(&config.fraction_selector).map_err(|e| AppError::Parse {
            message: format!("Invalid CSS selector '{}': {:?}", config.fraction_selector, e),
        })?;
        let blocking_regex = Regex::new(BLOCKING_MARKERS).map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            title_finder: ElementFinder::new(&config.title_selectors)?,
            price_finder: ElementFinder::new(&config.price_selectors)?,
            fraction_selector,
            blocking_regex,
        })
    }

    pub fn is_blocked(&self, body: &str) -> bool {
        self.blocking_regex.is_match(body)
    }

    pub fn extract(&self, body: &str) -> PriceCheck {
        if self.is_blocked(body) {
            return PriceCheck::failed(None, CheckFailure::Blocked);
        }

        let document = Html::parse_document(body);

        let title = self
            .title_finder
            .find_first(&document)
            .map(|m| m.text)
            .unwrap_or_else(|| TITLE_NOT_FOUND.to_string());

        let Some(whole) = self.price_finder.find_first(&document) else {
            return PriceCheck::failed(Some(title), CheckFailure::PriceNotFound);
        };
        tracing::trace!(selector = %whole.selector, text = %whole.text, "Matched price element");

        let fraction = document
            .select(&self.fraction_selector)
            .next()
            .map(element_text);
        let price_text = join_price_parts(&whole.text, fraction.as_deref());

        let cleaned = clean_price_text(&price_text);
        if cleaned.is_empty() {
            return PriceCheck::failed(Some(title), CheckFailure::PriceUnparsable { text: price_text });
        }

        // Digits and dots that still are not a number ("1.2.3") surface as a plain error, title dropped.
        match parse_price(&cleaned) {
            Ok(price) => PriceCheck::found(title, price),
            Err(reason) => PriceCheck::failed(None, reason),
        }
    }
}

/// Appends the fractional fragment, supplying the decimal point when the whole part lacks one.
fn join_price_parts(whole: &str, fraction: Option<&str>) -> String {
    match fraction {
        Some(fraction) if !fraction.is_empty() => {
            if whole.contains('.') {
                format!("{}{}", whole, fraction)
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        _ => whole.to_string(),
    }
}

/// Keeps only ASCII digits and '.'.
pub fn clean_price_text(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Parses already-cleaned price text.
pub fn parse_price(cleaned: &str) -> std::result::Result<f64, CheckFailure> {
    cleaned
        .parse::<f64>()
        .map_err(|_| CheckFailure::Request(format!("could not convert string to float: '{}'", cleaned)))
}

/// Fetch + extract, exposed to the polling loop as a [`TrackerPlugin`].
pub struct PriceTracker {
    scraper: WebScraper,
    extractor: PriceExtractor,
}

impl PriceTracker {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            scraper: WebScraper::new(config)?,
            extractor: PriceExtractor::new(config)?,
        })
    }

    pub fn with_parts(scraper: WebScraper, extractor: PriceExtractor) -> Self {
        Self { scraper, extractor }
    }
}

#[async_trait]
impl TrackerPlugin for PriceTracker {
    fn name(&self) -> &str {
        "Price Tracker"
    }

    async fn check(&self, url: &str) -> PriceCheck {
        match self.scraper.fetch(url).await {
            Ok(page) => self.extractor.extract(&page.body),
            Err(ScrapeError::Status(status)) => {
                PriceCheck::failed(None, CheckFailure::HttpStatus(status.as_u16()))
            }
            Err(ScrapeError::Request(e)) => {
                tracing::warn!(url, error = %e, "Page fetch failed");
                PriceCheck::failed(None, CheckFailure::Request(e.to_string()))
            }
        }
    }
}
