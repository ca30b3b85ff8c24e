use crate::{
    entities::{cart, cart_item, Cart, CartItem, Product},
    errors::ServiceError,
    services::catalog::effective_sale,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-customer basket. The cart never reserves inventory: adds perform a
/// visible-stock check only, and reservation happens when the order is
/// placed. Totals are recomputed from the items on every mutation.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: cart::Model,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

fn item_view(item: cart_item::Model) -> CartItemView {
    CartItemView {
        id: item.id,
        product_id: item.product_id,
        quantity: item.quantity,
        subtotal: item.unit_price * Decimal::from(item.quantity),
        unit_price: item.unit_price,
    }
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fetch the customer's cart, creating an empty one on first use.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, customer_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = Self::get_or_create_model(&*self.db, customer_id).await?;
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;

        Ok(CartWithItems {
            cart,
            items: items.into_iter().map(item_view).collect(),
        })
    }

    async fn get_or_create_model<C: ConnectionTrait>(
        conn: &C,
        customer_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            total_amount: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;
        info!(cart_id = %created.id, customer_id = %customer_id, "cart created");
        Ok(created)
    }

    /// Add a product or merge into an existing line. The unit price is
    /// overwritten with the current effective price either way.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        if product.stock_quantity < quantity {
            return Err(ServiceError::ValidationError(format!(
                "insufficient stock for {}: {} available",
                product.name, product.stock_quantity
            )));
        }

        let now = Utc::now();
        let unit_price = effective_sale(product.price, product.sale_price, product.expiry_date, now)
            .unwrap_or(product.price);

        let cart = Self::get_or_create_model(&txn, customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(merged);
                active.unit_price = Set(unit_price);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    unit_price: Set(unit_price),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        let (cart, items) = Self::recalculate(&txn, cart.id).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, product_id = %product_id, quantity, "item added to cart");
        Ok(CartWithItems {
            cart,
            items: items.into_iter().map(item_view).collect(),
        })
    }

    /// Change the quantity of a line the caller owns.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let (item, cart) = Self::owned_item(&txn, customer_id, item_id).await?;

        let product = Product::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
        if product.stock_quantity < quantity {
            return Err(ServiceError::ValidationError(format!(
                "insufficient stock for {}: {} available",
                product.name, product.stock_quantity
            )));
        }

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let (cart, items) = Self::recalculate(&txn, cart.id).await?;
        txn.commit().await?;

        Ok(CartWithItems {
            cart,
            items: items.into_iter().map(item_view).collect(),
        })
    }

    /// Remove a line the caller owns.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let (item, cart) = Self::owned_item(&txn, customer_id, item_id).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;

        let (cart, items) = Self::recalculate(&txn, cart.id).await?;
        txn.commit().await?;

        Ok(CartWithItems {
            cart,
            items: items.into_iter().map(item_view).collect(),
        })
    }

    async fn owned_item<C: ConnectionTrait>(
        conn: &C,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<(cart_item::Model, cart::Model), ServiceError> {
        let item = CartItem::find_by_id(item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {item_id} not found")))?;

        let cart = Cart::find_by_id(item.cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        if cart.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "Cart item belongs to another customer".to_string(),
            ));
        }
        Ok((item, cart))
    }

    /// Delete all items and zero the total. Used at checkout and by the
    /// payment webhook, inside the caller's transaction.
    pub async fn clear_for_customer<C: ConnectionTrait>(
        conn: &C,
        customer_id: Uuid,
    ) -> Result<(), ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
        else {
            return Ok(());
        };

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(conn)
            .await?;

        let mut active: cart::ActiveModel = cart.into();
        active.total_amount = Set(Decimal::ZERO);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        info!(customer_id = %customer_id, "cart cleared");
        Ok(())
    }

    async fn recalculate<C: ConnectionTrait>(
        conn: &C,
        cart_id: Uuid,
    ) -> Result<(cart::Model, Vec<cart_item::Model>), ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let mut active: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {cart_id} not found")))?
            .into();
        active.total_amount = Set(total);
        active.updated_at = Set(Utc::now());
        let cart = active.update(conn).await?;

        Ok((cart, items))
    }
}
