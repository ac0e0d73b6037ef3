pub mod order_items;
pub mod order_timeline;
pub mod orders;
pub mod products;

pub use order_items::Entity as OrderItems;
pub use order_timeline::Entity as OrderTimeline;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
