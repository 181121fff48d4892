//! Order record store.
//!
//! Owned exclusively by this process; no other component mutates it directly.
//! Insert enforces two unique constraints under one write lock: the order
//! number (a generator collision surfaces as `DuplicateOrderNumber` instead
//! of a silent overwrite) and the payment intent id (concurrent deliveries
//! of the same payment confirmation cannot both insert).

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::order::Order;

/// Orders keyed by order number, with a payment-intent index kept in lockstep
/// under the same lock.
struct Inner {
    orders: HashMap<String, Order>,
    by_intent: HashMap<String, String>,
}

pub struct OrderStore {
    inner: RwLock<Inner>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                orders: HashMap::new(),
                by_intent: HashMap::new(),
            }),
        }
    }

    /// Insert a new order. Fails if the order number is already taken, or if
    /// another order already carries the same payment transaction id. Both
    /// checks and the insert happen under one write lock.
    pub fn insert(&self, order: Order) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("order insert"))?;
        let Inner { orders, by_intent } = &mut *inner;

        if let Some(intent_id) = order.payment.transaction_id.as_deref() {
            if let Some(existing) = by_intent.get(intent_id) {
                return Err(StoreError::DuplicatePaymentIntent {
                    intent_id: intent_id.to_string(),
                    order_number: existing.clone(),
                });
            }
        }
        match orders.entry(order.order_number.clone()) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateOrderNumber(entry.key().clone())),
            Entry::Vacant(entry) => {
                if let Some(intent_id) = order.payment.transaction_id.clone() {
                    by_intent.insert(intent_id, order.order_number.clone());
                }
                entry.insert(order);
                Ok(())
            }
        }
    }

    pub fn get(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("order read"))?;
        Ok(inner.orders.get(order_number).cloned())
    }

    /// Mutate an order in place under the write lock; returns the updated
    /// order, or `None` if absent. Keeps the intent index in sync when the
    /// mutation changes the transaction id.
    pub fn update<F>(&self, order_number: &str, mutate: F) -> Result<Option<Order>, StoreError>
    where
        F: FnOnce(&mut Order),
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("order update"))?;
        let Inner { orders, by_intent } = &mut *inner;
        match orders.get_mut(order_number) {
            Some(order) => {
                let before = order.payment.transaction_id.clone();
                mutate(order);
                if order.payment.transaction_id != before {
                    if let Some(old) = before {
                        by_intent.remove(&old);
                    }
                    if let Some(new) = order.payment.transaction_id.clone() {
                        by_intent.insert(new, order.order_number.clone());
                    }
                }
                Ok(Some(order.clone()))
            }
            None => Ok(None),
        }
    }

    /// Explicit admin delete. No soft-delete or archival.
    pub fn delete(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("order delete"))?;
        let removed = inner.orders.remove(order_number);
        if let Some(intent_id) = removed
            .as_ref()
            .and_then(|order| order.payment.transaction_id.as_deref())
        {
            let intent_id = intent_id.to_string();
            inner.by_intent.remove(&intent_id);
        }
        Ok(removed)
    }

    /// Idempotency lookup for the webhook path: find the order created for a
    /// given payment-provider transaction id, if any.
    pub fn find_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("order find"))?;
        Ok(inner
            .by_intent
            .get(intent_id)
            .and_then(|number| inner.orders.get(number))
            .cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("order count"))?;
        Ok(inner.orders.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
