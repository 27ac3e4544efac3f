// Tracker plugin implementations
pub mod price;

pub use price::{PriceExtractor, PriceTracker};
