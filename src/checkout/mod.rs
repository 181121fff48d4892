//! Order creation service.
//!
//! Validates a checkout payload, re-derives every line subtotal server-side,
//! verifies the client-declared total against the server-side recomputation,
//! reserves stock per line item, generates an order number, and writes the
//! order record. Both creation paths (synchronous guest checkout and the
//! asynchronous webhook) run through here, so inventory stays consistent
//! regardless of how an order arrives.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::catalog::ProductStore;
use crate::error::StoreError;
use crate::money::Cents;
use crate::order::{
    Order, OrderItem, OrderNumberGenerator, OrderStatus, PaymentRecord, PaymentStatus, Pricing,
};
use crate::store::OrderStore;

mod input;

pub use input::{CheckoutItem, CheckoutRequest};

/// Allowed divergence between the client-declared total and the server-side
/// recomputation, covering decimal rounding at the JSON boundary.
pub const TOTAL_TOLERANCE: Cents = 1;

#[derive(Debug)]
pub enum CheckoutError {
    /// A required top-level field is absent from the payload.
    MissingField(&'static str),
    /// Payload decode / deserialization failed.
    Decode(String),
    EmptyItems,
    ZeroQuantity { title: String },
    /// A negative amount, or a non-positive total.
    InvalidAmount(&'static str),
    /// Client-declared total diverges from the server-side recomputation.
    TotalMismatch { declared: Cents, computed: Cents },
    UnknownProduct(String),
    OutOfStock {
        product_id: String,
        requested: u32,
        available: i64,
    },
    /// An order for this payment intent already exists. Raised at insert
    /// time, so a concurrent duplicate delivery loses cleanly instead of
    /// creating a second order.
    AlreadyPlaced {
        intent_id: String,
        order_number: String,
    },
    /// Persistence failure, including an order-number collision.
    Store(StoreError),
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutError::MissingField(field) => write!(f, "missing required field: {}", field),
            CheckoutError::Decode(msg) => write!(f, "invalid checkout payload: {}", msg),
            CheckoutError::EmptyItems => write!(f, "order must contain at least one item"),
            CheckoutError::ZeroQuantity { title } => {
                write!(f, "item quantity must be at least 1: {}", title)
            }
            CheckoutError::InvalidAmount(field) => write!(f, "invalid amount for {}", field),
            CheckoutError::TotalMismatch { declared, computed } => write!(
                f,
                "declared total {} does not match computed total {}",
                crate::money::to_decimal(*declared),
                crate::money::to_decimal(*computed)
            ),
            CheckoutError::UnknownProduct(id) => write!(f, "unknown product: {}", id),
            CheckoutError::OutOfStock {
                product_id,
                requested,
                available,
            } => write!(
                f,
                "out of stock: product {} (requested {}, available {})",
                product_id, requested, available
            ),
            CheckoutError::AlreadyPlaced {
                intent_id,
                order_number,
            } => write!(
                f,
                "payment {} already placed as order {}",
                intent_id, order_number
            ),
            CheckoutError::Store(e) => write!(f, "persistence failure: {}", e),
        }
    }
}

impl std::error::Error for CheckoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckoutError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownProduct(id) => CheckoutError::UnknownProduct(id),
            StoreError::OutOfStock {
                product_id,
                requested,
                available,
            } => CheckoutError::OutOfStock {
                product_id,
                requested,
                available,
            },
            StoreError::DuplicatePaymentIntent {
                intent_id,
                order_number,
            } => CheckoutError::AlreadyPlaced {
                intent_id,
                order_number,
            },
            other => CheckoutError::Store(other),
        }
    }
}

impl CheckoutError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::MissingField(_)
            | CheckoutError::Decode(_)
            | CheckoutError::EmptyItems
            | CheckoutError::ZeroQuantity { .. }
            | CheckoutError::InvalidAmount(_)
            | CheckoutError::TotalMismatch { .. } => 400,
            CheckoutError::UnknownProduct(_) => 422,
            CheckoutError::OutOfStock { .. } | CheckoutError::AlreadyPlaced { .. } => 409,
            CheckoutError::Store(_) => 500,
        }
    }
}

pub struct CheckoutService {
    orders: Arc<OrderStore>,
    products: Arc<ProductStore>,
    numbers: OrderNumberGenerator,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<OrderStore>,
        products: Arc<ProductStore>,
        numbers: OrderNumberGenerator,
    ) -> Self {
        Self {
            orders,
            products,
            numbers,
        }
    }

    pub fn orders(&self) -> &Arc<OrderStore> {
        &self.orders
    }

    pub fn products(&self) -> &Arc<ProductStore> {
        &self.products
    }

    /// Entry point for the raw guest-checkout payload: checks required fields
    /// before attempting the typed decode, so a missing `customer` reads as
    /// "missing required field" rather than a decode error.
    pub fn place(&self, payload: Value) -> Result<Order, CheckoutError> {
        for field in ["customer", "items", "total"] {
            if payload.get(field).is_none() {
                return Err(CheckoutError::MissingField(field));
            }
        }
        let request: CheckoutRequest =
            serde_json::from_value(payload).map_err(|e| CheckoutError::Decode(e.to_string()))?;
        self.create(request)
    }

    /// Webhook / replay path: the provider has confirmed payment, so the
    /// payment record is completed and carries the intent id regardless of
    /// what the stored blob says.
    pub fn fulfill(
        &self,
        mut request: CheckoutRequest,
        intent_id: &str,
    ) -> Result<Order, CheckoutError> {
        request.payment_intent_id = Some(intent_id.to_string());
        request.payment_status = Some(PaymentStatus::Completed);
        self.create(request)
    }

    /// Validate, reserve stock, and persist one order.
    pub fn create(&self, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        let items = Self::priced_items(&request)?;
        let pricing = Self::verified_pricing(&request, &items)?;

        // Conditional reservations, released again if a later step fails.
        let mut reserved: Vec<(&str, u32)> = Vec::new();
        for item in &request.items {
            if let Some(product_id) = item.product_id.as_deref() {
                if let Err(err) = self.products.reserve(product_id, item.quantity) {
                    self.release_all(&reserved);
                    return Err(err.into());
                }
                reserved.push((product_id, item.quantity));
            }
        }

        let payment_status = request.payment_status.unwrap_or_default();
        let payment = PaymentRecord {
            method: if request.payment_intent_id.is_some() {
                "stripe".to_string()
            } else {
                "cod".to_string()
            },
            status: payment_status,
            transaction_id: request.payment_intent_id.clone(),
            paid_at: (payment_status == PaymentStatus::Completed).then(Utc::now),
        };
        let status = if payment_status == PaymentStatus::Completed {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        };

        let order = Order::new(
            self.numbers.generate(),
            request.customer,
            items,
            pricing,
            payment,
            status,
        );

        if let Err(err) = self.orders.insert(order.clone()) {
            self.release_all(&reserved);
            return Err(err.into());
        }
        Ok(order)
    }

    /// Re-derive line subtotals as price × quantity; client-sent item
    /// subtotals are never trusted.
    fn priced_items(request: &CheckoutRequest) -> Result<Vec<OrderItem>, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyItems);
        }

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.quantity == 0 {
                return Err(CheckoutError::ZeroQuantity {
                    title: item.title.clone(),
                });
            }
            if item.price < 0 {
                return Err(CheckoutError::InvalidAmount("item price"));
            }
            let subtotal = item
                .price
                .checked_mul(Cents::from(item.quantity))
                .ok_or(CheckoutError::InvalidAmount("item subtotal"))?;
            items.push(OrderItem {
                product_id: item.product_id.clone(),
                title: item.title.clone(),
                price: item.price,
                quantity: item.quantity,
                selected_capacity: item.selected_capacity.clone(),
                selected_color: item.selected_color.clone(),
                subtotal,
            });
        }
        Ok(items)
    }

    /// Recompute the authoritative total server-side and reject a declared
    /// total that diverges beyond the rounding tolerance.
    fn verified_pricing(
        request: &CheckoutRequest,
        items: &[OrderItem],
    ) -> Result<Pricing, CheckoutError> {
        if request.shipping < 0 {
            return Err(CheckoutError::InvalidAmount("shipping"));
        }
        if request.tax < 0 {
            return Err(CheckoutError::InvalidAmount("tax"));
        }
        if request.discount < 0 {
            return Err(CheckoutError::InvalidAmount("discount"));
        }
        if request.total <= 0 {
            return Err(CheckoutError::InvalidAmount("total"));
        }

        // Amounts are client-supplied; overflow must reject, not wrap.
        let subtotal = items
            .iter()
            .try_fold(0 as Cents, |acc, item| acc.checked_add(item.subtotal))
            .ok_or(CheckoutError::InvalidAmount("subtotal"))?;
        let computed = subtotal
            .checked_add(request.shipping)
            .and_then(|sum| sum.checked_add(request.tax))
            .and_then(|sum| sum.checked_sub(request.discount))
            .ok_or(CheckoutError::InvalidAmount("total"))?;
        let delta = request
            .total
            .checked_sub(computed)
            .ok_or(CheckoutError::InvalidAmount("total"))?;
        if delta.abs() > TOTAL_TOLERANCE {
            return Err(CheckoutError::TotalMismatch {
                declared: request.total,
                computed,
            });
        }

        Ok(Pricing {
            subtotal,
            shipping: request.shipping,
            tax: request.tax,
            discount: request.discount,
            total: request.total,
        })
    }

    fn release_all(&self, reserved: &[(&str, u32)]) {
        for (product_id, quantity) in reserved {
            if let Err(err) = self.products.release(product_id, *quantity) {
                tracing::error!(product_id, quantity, %err, "failed to release reservation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use crate::order::CustomerInfo;
    use serde_json::json;

    fn service() -> CheckoutService {
        let products = Arc::new(ProductStore::new());
        products
            .upsert(Product {
                id: "sku-widget".into(),
                title: "Widget".into(),
                price: 1000,
                stock: 10,
            })
            .unwrap();
        CheckoutService::new(
            Arc::new(OrderStore::new()),
            products,
            OrderNumberGenerator::new("ORD-"),
        )
    }

    fn request(total: Cents) -> CheckoutRequest {
        CheckoutRequest {
            customer: CustomerInfo {
                full_name: "Jane Doe".into(),
                email: "jane@x.com".into(),
                phone: "555-1234".into(),
                address: "1 Main St".into(),
                city: "Metropolis".into(),
                zipcode: "12345".into(),
                country: "US".into(),
            },
            items: vec![CheckoutItem {
                product_id: Some("sku-widget".into()),
                title: "Widget".into(),
                price: 1000,
                quantity: 2,
                selected_capacity: None,
                selected_color: None,
            }],
            subtotal: 2000,
            shipping: 500,
            tax: 200,
            discount: 0,
            total,
            payment_intent_id: None,
            payment_status: None,
        }
    }

    #[test]
    fn create_recomputes_subtotals_and_reserves_stock() {
        let service = service();
        let order = service.create(request(2700)).unwrap();

        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.pricing.subtotal, 2000);
        assert_eq!(order.pricing.total, 2700);
        assert_eq!(order.items[0].subtotal, 2000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.method, "cod");
        assert_eq!(
            service.products().stock_of("sku-widget").unwrap(),
            Some(8)
        );
        assert_eq!(service.orders().len().unwrap(), 1);
    }

    #[test]
    fn tampered_total_rejected() {
        let service = service();
        // client declares 1.00 against a computed 27.00
        let err = service.create(request(100)).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::TotalMismatch {
                declared: 100,
                computed: 2700
            }
        ));
        assert!(service.orders().is_empty().unwrap());
        // nothing was reserved
        assert_eq!(
            service.products().stock_of("sku-widget").unwrap(),
            Some(10)
        );
    }

    #[test]
    fn place_requires_fields_before_decode() {
        let service = service();
        let err = service
            .place(json!({ "items": [], "total": 27.0 }))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("customer")));

        let err = service
            .place(json!({ "customer": {}, "total": 27.0 }))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("items")));

        let err = service.place(json!({ "customer": {}, "items": [] })).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("total")));
        assert!(service.orders().is_empty().unwrap());
    }

    #[test]
    fn empty_items_rejected() {
        let service = service();
        let mut req = request(2700);
        req.items.clear();
        assert!(matches!(
            service.create(req).unwrap_err(),
            CheckoutError::EmptyItems
        ));
    }

    #[test]
    fn zero_quantity_rejected() {
        let service = service();
        let mut req = request(700);
        req.items[0].quantity = 0;
        assert!(matches!(
            service.create(req).unwrap_err(),
            CheckoutError::ZeroQuantity { .. }
        ));
    }

    #[test]
    fn out_of_stock_aborts_and_maps_to_409() {
        let service = service();
        let mut req = request(2700);
        req.items[0].quantity = 20;
        req.total = 20_700;
        req.subtotal = 20_000;

        let err = service.create(req).unwrap_err();
        assert!(matches!(err, CheckoutError::OutOfStock { .. }));
        assert_eq!(err.status_code(), 409);
        assert!(service.orders().is_empty().unwrap());
        assert_eq!(
            service.products().stock_of("sku-widget").unwrap(),
            Some(10)
        );
    }

    #[test]
    fn failed_checkout_releases_earlier_reservations() {
        let service = service();
        service
            .products()
            .upsert(Product {
                id: "sku-gadget".into(),
                title: "Gadget".into(),
                price: 500,
                stock: 0,
            })
            .unwrap();

        let mut req = request(2700);
        req.items.push(CheckoutItem {
            product_id: Some("sku-gadget".into()),
            title: "Gadget".into(),
            price: 500,
            quantity: 1,
            selected_capacity: None,
            selected_color: None,
        });
        req.total = 3200;

        let err = service.create(req).unwrap_err();
        assert!(matches!(err, CheckoutError::OutOfStock { .. }));
        // the widget reservation taken before the gadget failure was returned
        assert_eq!(
            service.products().stock_of("sku-widget").unwrap(),
            Some(10)
        );
    }

    #[test]
    fn overflowing_amounts_rejected_not_wrapped() {
        let service = service();

        // line subtotal: price * quantity would exceed i64
        let mut req = request(2700);
        req.items[0].product_id = None;
        req.items[0].price = Cents::MAX;
        req.items[0].quantity = 2;
        let err = service.create(req).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAmount("item subtotal")));

        // computed total: subtotal + shipping would exceed i64
        let mut req = request(2700);
        req.items[0].product_id = None;
        req.items[0].price = Cents::MAX;
        req.items[0].quantity = 1;
        req.shipping = Cents::MAX;
        let err = service.create(req).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAmount("total")));
        assert!(service.orders().is_empty().unwrap());
    }

    #[test]
    fn fulfill_marks_payment_completed() {
        let service = service();
        let order = service.fulfill(request(2700), "pi_123").unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment.status, PaymentStatus::Completed);
        assert_eq!(order.payment.method, "stripe");
        assert_eq!(order.payment.transaction_id.as_deref(), Some("pi_123"));
        assert!(order.payment.paid_at.is_some());
    }

    #[test]
    fn second_fulfill_for_same_intent_rejected() {
        let service = service();
        let first = service.fulfill(request(2700), "pi_123").unwrap();

        let err = service.fulfill(request(2700), "pi_123").unwrap_err();
        match err {
            CheckoutError::AlreadyPlaced {
                intent_id,
                order_number,
            } => {
                assert_eq!(intent_id, "pi_123");
                assert_eq!(order_number, first.order_number);
            }
            other => panic!("expected AlreadyPlaced, got {:?}", other),
        }
        assert_eq!(service.orders().len().unwrap(), 1);
        // the losing attempt released its reservation
        assert_eq!(service.products().stock_of("sku-widget").unwrap(), Some(8));
    }

    #[test]
    fn number_collision_surfaces_as_write_error() {
        let products = Arc::new(ProductStore::new());
        let service = CheckoutService::new(
            Arc::new(OrderStore::new()),
            products,
            OrderNumberGenerator::new("ORD-")
                .with_suffix_source(|| 7)
                .with_clock(|| 1_700_000_000_000),
        );

        let mut req = request(2700);
        req.items[0].product_id = None;
        service.create(req.clone()).unwrap();

        let err = service.create(req).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Store(StoreError::DuplicateOrderNumber(_))
        ));
        assert_eq!(err.status_code(), 500);
        assert_eq!(service.orders().len().unwrap(), 1);
    }
}
