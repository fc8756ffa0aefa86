//! Product Model

use serde::{Deserialize, Serialize};

/// Category name used when the remote catalog reports none
pub const DEFAULT_CATEGORY: &str = "Genel";

/// Product entity as persisted in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Natural key; mirrors the remote SKU when the product came from the catalog
    pub barcode: String,
    pub price: f64,
    pub stock: i64,
    pub category: String,
    pub description: String,
    pub image: Option<String>,
    /// Catalog-side identifier, `None` for products that only exist locally
    pub remote_id: Option<i64>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    /// Catalog `date_modified` at the time of the last pull (Unix millis)
    pub remote_updated_at: Option<i64>,
    /// When the row was last written from the catalog
    #[serde(default)]
    pub pulled_at: Option<i64>,
}

impl Product {
    /// Edited locally after the last catalog write and after `last_sync`
    ///
    /// Never true before the first completed sync: there is no baseline to compare with.
    pub fn is_locally_modified(&self, last_sync: Option<i64>) -> bool {
        let after_sync = last_sync.is_some_and(|ls| self.updated_at > ls);
        let after_pull = self.pulled_at.is_none_or(|pulled| self.updated_at > pulled);
        after_sync && after_pull
    }
}

/// Upsert payload
///
/// Matching order: `id`, then `remote_id`, then `barcode`. No match creates a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpsert {
    pub id: Option<i64>,
    pub name: String,
    pub barcode: String,
    pub price: f64,
    pub stock: i64,
    pub category: String,
    pub description: String,
    pub image: Option<String>,
    pub remote_id: Option<i64>,
    pub is_active: bool,
    pub remote_updated_at: Option<i64>,
    /// Written from the catalog (pull, webhook or remote-wins resolution)
    #[serde(default)]
    pub from_remote: bool,
}

impl ProductUpsert {
    /// Build an upsert that rewrites an existing product in place
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: Some(product.id),
            name: product.name.clone(),
            barcode: product.barcode.clone(),
            price: product.price,
            stock: product.stock,
            category: product.category.clone(),
            description: product.description.clone(),
            image: product.image.clone(),
            remote_id: product.remote_id,
            is_active: product.is_active,
            remote_updated_at: product.remote_updated_at,
            from_remote: false,
        }
    }
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

/// Partial update replayed from the offline queue (last write wins per field)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductPatch {
    /// Apply the patch onto a product; returns true if any field changed
    pub fn apply_to(&self, product: &mut Product) -> bool {
        let before = product.clone();
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        *product != before
    }
}

/// Filter for listing products
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Only products with `updated_at` strictly greater than this
    pub updated_since: Option<i64>,
    /// Only products linked to the remote catalog
    pub linked_only: bool,
    /// Skip deactivated products
    pub active_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(since) = self.updated_since
            && product.updated_at <= since
        {
            return false;
        }
        if self.linked_only && product.remote_id.is_none() {
            return false;
        }
        if self.active_only && !product.is_active {
            return false;
        }
        true
    }
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub remote_id: Option<i64>,
    pub updated_at: i64,
}
