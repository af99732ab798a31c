pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod chat_messages;
pub mod chats;
pub mod farms;
pub mod ip_logs;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use chat_messages::Entity as ChatMessages;
pub use chats::Entity as Chats;
pub use farms::Entity as Farms;
pub use ip_logs::Entity as IpLogs;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
