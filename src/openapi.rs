use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Glowcart API",
        version = "0.3.0",
        description = r#"
Backend for a cosmetics and pharmacy storefront.

Covers the product catalog, per-customer carts, the order lifecycle with
its stock bookkeeping, hosted-checkout payments with webhook
reconciliation, and batch-level inventory (FIFO by expiry, disposal,
expiry reports).

All endpoints except the product reads and the payment webhook require a
bearer token in the `Authorization` header.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::set_sale_price,
        crate::handlers::products::low_stock,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::orders::create_order,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::stats,
        crate::handlers::orders::manage,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_status_scoped,
        crate::handlers::orders::update_status,
        crate::handlers::orders::update_payment_status,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::webhook,
        crate::handlers::payments::reset,
        crate::handlers::inventory::create_batch,
        crate::handlers::inventory::list_batches,
        crate::handlers::inventory::get_batch,
        crate::handlers::inventory::approve_batch,
        crate::handlers::inventory::dispose_batch,
        crate::handlers::inventory::expiring_soon,
        crate::handlers::inventory::expired,
        crate::handlers::inventory::list_movements,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
    ),
    tags(
        (name = "Products", description = "Catalog with read-time auto-sale"),
        (name = "Cart", description = "Per-customer basket"),
        (name = "Orders", description = "Order lifecycle and stock bookkeeping"),
        (name = "Payments", description = "Hosted checkout and webhook reconciliation"),
        (name = "Batches", description = "Batch inventory, FIFO and expiry reports"),
        (name = "Suppliers", description = "Supplier registry"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
