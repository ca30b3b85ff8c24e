pub mod carts;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod suppliers;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    carts::CartService, catalog::ProductCatalogService, inventory::InventoryService,
    orders::OrderService, payments::PaymentService, provider::CheckoutProvider,
    suppliers::SupplierService,
};
use std::sync::Arc;

/// Business services consumed by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub inventory: Arc<InventoryService>,
    pub suppliers: Arc<SupplierService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        provider: Arc<dyn CheckoutProvider>,
        config: &AppConfig,
    ) -> Self {
        let shipping_fee = config.shipping_fee_decimal();
        Self {
            catalog: Arc::new(ProductCatalogService::new(db.clone())),
            carts: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                shipping_fee,
            )),
            payments: Arc::new(PaymentService::new(
                db.clone(),
                event_sender.clone(),
                provider,
                config.payment.link_timeout_secs,
                config.payment.stale_after_mins,
            )),
            inventory: Arc::new(InventoryService::new(db.clone(), event_sender)),
            suppliers: Arc::new(SupplierService::new(db)),
        }
    }
}
