use std::path::{Path, PathBuf};

use crate::models::TrackedProduct;
use crate::utils::error::{AppError, Result};

pub const CSV_HEADER: [&str; 2] = ["URL", "TargetPrice"];

/// The ordered list of tracked products, mirrored to a two-column CSV file.
///
/// Every successful [`add`](Self::add) or [`remove`](Self::remove) rewrites the file.
#[derive(Debug)]
pub struct ProductManager {
    path: PathBuf,
    products: Vec<TrackedProduct>,
}

impl ProductManager {
    /// Loads the list from `path`. A missing file is an empty list.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let products = if path.exists() {
            read_products(&path)?
        } else {
            tracing::info!(path = %path.display(), "No tracking file yet, starting with an empty list");
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = products.len(), "Loaded tracking list");
        Ok(Self { path, products })
    }

    /// Wraps an existing list without touching the file until the next change.
    pub fn with_products(path: impl Into<PathBuf>, products: Vec<TrackedProduct>) -> Self {
        Self {
            path: path.into(),
            products,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn products(&self) -> &[TrackedProduct] {
        &self.products
    }

    /// Copy taken by the polling worker at the start of each pass.
    pub fn snapshot(&self) -> Vec<TrackedProduct> {
        self.products.clone()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn add(&mut self, product: TrackedProduct) -> Result<()> {
        self.products.push(product);
        if let Err(e) = self.save() {
            self.products.pop();
            return Err(e);
        }
        tracing::info!(count = self.products.len(), "Product added");
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<TrackedProduct> {
        if index >= self.products.len() {
            return Err(AppError::NotFound {
                resource: format!("product #{}", index),
            });
        }

        let removed = self.products.remove(index);
        if let Err(e) = self.save() {
            self.products.insert(index, removed);
            return Err(e);
        }
        tracing::info!(url = %removed.url, "Product removed");
        Ok(removed)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(CSV_HEADER)?;
        for product in &self.products {
            let target_price = product.target_price.to_string();
            writer.write_record([product.url.as_str(), target_price.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_products(path: &Path) -> Result<Vec<TrackedProduct>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut products = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let url = record.get(0).unwrap_or_default().to_string();
        let target_price = record
            .get(1)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|price| price.is_finite() && *price >= 0.0)
            .ok_or_else(|| AppError::Parse {
                message: format!("{}: line {}: invalid target price", path.display(), line),
            })?;

        products.push(TrackedProduct { url, target_price });
    }
    Ok(products)
}
