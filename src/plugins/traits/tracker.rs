use async_trait::async_trait;

use crate::models::PriceCheck;

/// Looks up the current price of a product page.
///
/// Implementations never fail outright: every problem (network, blocking, parsing) is folded
/// into a [`PriceCheck::Failed`] so the polling loop can log it and move on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, url: &str) -> PriceCheck;
}
