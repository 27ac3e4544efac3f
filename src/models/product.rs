use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::error::{AppError, Result};

pub const INVALID_PRICE_MESSAGE: &str = "Please enter a valid number for the price.";
pub const INVALID_URL_MESSAGE: &str = "Please enter a valid product URL.";

/// A product page being watched, with the price at or below which an alert fires.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TrackedProduct {
    #[validate(url(message = "Please enter a valid product URL."))]
    pub url: String,

    #[validate(range(min = 0.0, message = "Please enter a valid number for the price."))]
    pub target_price: f64,
}

impl TrackedProduct {
    /// Builds a product from user input, rejecting bad URLs and negative or non-finite prices.
    pub fn new(url: impl Into<String>, target_price: f64) -> Result<Self> {
        let product = Self {
            url: url.into().trim().to_string(),
            target_price,
        };
        if !product.target_price.is_finite() {
            return Err(AppError::Validation(INVALID_PRICE_MESSAGE.to_string()));
        }
        product.validate()?;
        if !has_web_scheme(&product.url) {
            return Err(AppError::Validation(INVALID_URL_MESSAGE.to_string()));
        }
        Ok(product)
    }

    pub fn is_deal(&self, current_price: f64) -> bool {
        current_price <= self.target_price
    }

    /// First 50 characters of the URL, for log lines.
    pub fn short_url(&self) -> String {
        self.url.chars().take(50).collect()
    }
}

fn has_web_scheme(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Parses a target price typed by the user.
pub fn parse_target_price(input: &str) -> Result<f64> {
    match input.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::Validation(INVALID_PRICE_MESSAGE.to_string())),
    }
}

pub fn format_money(value: f64) -> String {
    format!("${:.2}", value)
}
