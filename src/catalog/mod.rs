//! Product catalog and the inventory updater.
//!
//! Stock adjustment is a conditional update: `reserve` only succeeds when
//! current stock covers the requested quantity, so concurrent checkouts can
//! never drive stock negative. A losing reservation comes back as
//! `StoreError::OutOfStock` and the caller decides how to compensate
//! (reject the checkout, refund, backorder).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::money::Cents;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(with = "crate::money")]
    pub price: Cents,
    pub stock: i64,
}

/// In-process product store. Consulted, not owned, by the order flow — the
/// only mutation this flow performs is the stock counter.
pub struct ProductStore {
    products: RwLock<HashMap<String, Product>>,
}

impl ProductStore {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
        }
    }

    pub fn upsert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("product upsert"))?;
        products.insert(product.id.clone(), product);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product read"))?;
        Ok(products.get(id).cloned())
    }

    pub fn stock_of(&self, id: &str) -> Result<Option<i64>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product read"))?;
        Ok(products.get(id).map(|p| p.stock))
    }

    /// Conditionally decrement stock: succeeds only if current stock covers
    /// `quantity`. The check and the decrement happen under one write lock.
    pub fn reserve(&self, id: &str, quantity: u32) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("stock reserve"))?;
        let product = products
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownProduct(id.to_string()))?;

        if product.stock < i64::from(quantity) {
            return Err(StoreError::OutOfStock {
                product_id: id.to_string(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= i64::from(quantity);
        Ok(())
    }

    /// Return previously reserved units, compensating a checkout that failed
    /// after some reservations were already taken.
    pub fn release(&self, id: &str, quantity: u32) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("stock release"))?;
        let product = products
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownProduct(id.to_string()))?;
        product.stock += i64::from(quantity);
        Ok(())
    }
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn widget(stock: i64) -> Product {
        Product {
            id: "sku-widget".into(),
            title: "Widget".into(),
            price: 1000,
            stock,
        }
    }

    #[test]
    fn reserve_decrements() {
        let store = ProductStore::new();
        store.upsert(widget(10)).unwrap();

        store.reserve("sku-widget", 3).unwrap();
        assert_eq!(store.stock_of("sku-widget").unwrap(), Some(7));
    }

    #[test]
    fn reserve_fails_below_requested() {
        let store = ProductStore::new();
        store.upsert(widget(2)).unwrap();

        let err = store.reserve("sku-widget", 3).unwrap_err();
        assert_eq!(
            err,
            StoreError::OutOfStock {
                product_id: "sku-widget".into(),
                requested: 3,
                available: 2,
            }
        );
        // failed reservation leaves stock untouched
        assert_eq!(store.stock_of("sku-widget").unwrap(), Some(2));
    }

    #[test]
    fn reserve_unknown_product() {
        let store = ProductStore::new();
        let err = store.reserve("missing", 1).unwrap_err();
        assert_eq!(err, StoreError::UnknownProduct("missing".into()));
    }

    #[test]
    fn release_restores_stock() {
        let store = ProductStore::new();
        store.upsert(widget(5)).unwrap();
        store.reserve("sku-widget", 5).unwrap();
        store.release("sku-widget", 2).unwrap();
        assert_eq!(store.stock_of("sku-widget").unwrap(), Some(2));
    }

    #[test]
    fn concurrent_reservations_never_go_negative() {
        let store = Arc::new(ProductStore::new());
        store.upsert(widget(5)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.reserve("sku-widget", 1).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 5);
        assert_eq!(store.stock_of("sku-widget").unwrap(), Some(0));
    }
}
