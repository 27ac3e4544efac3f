pub mod price_check;
pub mod product;

// Re-exports for convenience
pub use price_check::*;
pub use product::*;
