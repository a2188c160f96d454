pub mod customer_details;
pub mod enumeration;
pub mod product;
pub mod product_order;
pub mod shopping_cart;

pub use customer_details::{CustomerDetails, CustomerDetailsPatch};
pub use enumeration::{Gender, OrderStatus};
pub use product::Product;
pub use product_order::{ProductOrder, ProductOrderPatch};
pub use shopping_cart::{ShoppingCart, ShoppingCartPatch};
