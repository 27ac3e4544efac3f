use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TITLE_NOT_FOUND: &str = "Title not found";

/// Why a price check produced no price. `Display` is the text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CheckFailure {
    #[error("HTTP Error {0}. The page may not exist.")]
    HttpStatus(u16),

    #[error("Request blocked by CAPTCHA. Try again later.")]
    Blocked,

    #[error("Price element not found on page.")]
    PriceNotFound,

    #[error("Could not parse price from text.")]
    PriceUnparsable { text: String },

    #[error("Error: {0}")]
    Request(String),
}

/// Outcome of checking a single product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceCheck {
    Found {
        title: String,
        price: f64,
    },
    Failed {
        title: Option<String>,
        reason: CheckFailure,
    },
}

impl PriceCheck {
    pub fn found(title: impl Into<String>, price: f64) -> Self {
        PriceCheck::Found {
            title: title.into(),
            price,
        }
    }

    pub fn failed(title: Option<String>, reason: CheckFailure) -> Self {
        PriceCheck::Failed { title, reason }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            PriceCheck::Found { price, .. } => Some(*price),
            PriceCheck::Failed { .. } => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            PriceCheck::Found { title, .. } => Some(title),
            PriceCheck::Failed { title, .. } => title.as_deref(),
        }
    }

    pub fn failure(&self) -> Option<&CheckFailure> {
        match self {
            PriceCheck::Found { .. } => None,
            PriceCheck::Failed { reason, .. } => Some(reason),
        }
    }
}

/// A product whose current price is at or below its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub title: String,
    pub price: f64,
    pub url: String,
}
