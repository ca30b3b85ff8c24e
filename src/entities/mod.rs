pub mod batch;
pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_detail;
pub mod payment;
pub mod product;
pub mod stock_movement;
pub mod supplier;
pub mod user;

pub use batch::Entity as Batch;
pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_detail::Entity as OrderDetail;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use stock_movement::Entity as StockMovement;
pub use supplier::Entity as Supplier;
pub use user::Entity as User;
