//! Product descriptor loading.
//!
//! The descriptor is a JSON document listing the products this
//! application may lease:
//!
//! ```json
//! { "products": [ { "guid": "18324776654b3946fc44a5f3.49025204",
//!                   "name": "Example", "version": "1.0" } ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use floatlease_core::error::LeaseError;
use floatlease_core::result::LeaseResult;

/// One leasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    /// Product version GUID.
    pub guid: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Product version string reported to the server.
    #[serde(default)]
    pub version: String,
}

/// A parsed product descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Products covered by this descriptor.
    pub products: Vec<ProductEntry>,
}

impl ProductDescriptor {
    /// Parse a descriptor document.
    pub fn from_json(text: &str) -> LeaseResult<Self> {
        let descriptor: Self = serde_json::from_str(text).map_err(|e| {
            tracing::error!("Invalid product descriptor: {}", e);
            LeaseError::DatFile
        })?;

        if descriptor.products.iter().any(|p| p.guid.trim().is_empty()) {
            tracing::error!("Product descriptor contains an entry without a GUID");
            return Err(LeaseError::DatFile);
        }
        Ok(descriptor)
    }

    /// Read and parse a descriptor file.
    pub async fn load(path: &Path) -> LeaseResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), "Failed to read product descriptor: {}", e);
            LeaseError::DatFile
        })?;
        Self::from_json(&text)
    }

    /// Find a product by GUID.
    pub fn find(&self, guid: &str) -> Option<&ProductEntry> {
        self.products.iter().find(|p| p.guid == guid)
    }
}
