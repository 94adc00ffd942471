use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;
use validator::Validate;

use crate::models::{Catalog, NewProduct};
use crate::utils::error::{AppError, Result};

/// Source of the product catalog. Re-read before every poll cycle so that
/// edits take effect without a restart.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load(&self) -> Result<Catalog>;
}

/// The catalog as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl std::fmt::Display) -> AppError {
        AppError::Catalog {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Appends a product. Creates the file if it does not exist yet.
    pub async fn add_product(&self, product: NewProduct) -> Result<()> {
        product.validate()?;
        match Url::parse(&product.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(AppError::Validation(format!(
                    "url must be http or https: {}",
                    product.url
                )))
            }
        }

        let mut catalog = match tokio::fs::try_exists(&self.path).await? {
            true => self.load().await?,
            false => Catalog::default(),
        };

        tracing::info!("Adding {} to {}", product.name, self.path.display());
        catalog.products.push(product.into_entry());
        self.save(&catalog).await
    }

    /// Removes every entry with this name and returns how many went.
    pub async fn remove_product(&self, name: &str) -> Result<usize> {
        let mut catalog = self.load().await?;
        let before = catalog.products.len();
        catalog.products.retain(|entry| entry.name.as_deref() != Some(name));
        let removed = before - catalog.products.len();

        if removed > 0 {
            self.save(&catalog).await?;
            tracing::info!("Removed {} entries named {} from {}", removed, name, self.path.display());
        }
        Ok(removed)
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        let json = serde_json::to_string_pretty(catalog)?;

        // Write next to the target and rename so a reader never sees half a file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error(e))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn load(&self) -> Result<Catalog> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error(e))?;
        let catalog: Catalog = serde_json::from_str(&raw).map_err(|e| self.error(e))?;

        tracing::debug!(
            "Loaded {} catalog entries from {}",
            catalog.products.len(),
            self.path.display()
        );
        Ok(catalog)
    }
}
