//! Business logic. Each service owns one aggregate and is the only place
//! that touches its tables; handlers stay thin.

pub mod customers;
pub mod inventory;
pub mod orders;
pub mod production;
pub mod products;
pub mod users;

pub use customers::CustomerService;
pub use inventory::InventoryService;
pub use orders::OrderService;
pub use production::ProductionService;
pub use products::ProductService;
pub use users::UserService;
