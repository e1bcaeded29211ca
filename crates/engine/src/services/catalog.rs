//! Catalog lookup trait and in-memory implementation.
//!
//! The engine consults the catalog only at order-creation time, to verify
//! that every requested product exists and to freeze a snapshot of it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId, VariantId};
use domain::ProductSnapshot;

use crate::error::ServiceError;

/// A live catalog entry resolved at order time.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub sku: String,
    pub price: Money,
    /// False for services and digital goods; untracked products never
    /// create reservations.
    pub tracks_inventory: bool,
}

impl CatalogEntry {
    /// Freezes this entry into an order-time snapshot.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            name: self.name.clone(),
            sku: self.sku.clone(),
            price: self.price,
            tracks_inventory: self.tracks_inventory,
        }
    }
}

/// Trait for product/variant resolution.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolves a product/variant pair, returning `None` when the catalog
    /// has no such entry.
    async fn lookup(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Option<CatalogEntry>, ServiceError>;
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: Arc<RwLock<HashMap<(ProductId, Option<VariantId>), CatalogEntry>>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry.
    pub fn add(&self, entry: CatalogEntry) {
        self.entries.write().unwrap().insert(
            (entry.product_id.clone(), entry.variant_id.clone()),
            entry,
        );
    }

    /// Adds a simple tracked product with a price.
    pub fn add_product(&self, sku: &str, name: &str, price: Money) {
        self.add(CatalogEntry {
            product_id: ProductId::new(sku),
            variant_id: None,
            name: name.to_string(),
            sku: sku.to_string(),
            price,
            tracks_inventory: true,
        });
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn lookup(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Option<CatalogEntry>, ServiceError> {
        let key = (product_id.clone(), variant_id.cloned());
        Ok(self.entries.read().unwrap().get(&key).cloned())
    }
}
