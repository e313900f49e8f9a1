pub mod customer;
pub mod material_inventory;
pub mod order;
pub mod order_product;
pub mod product;
pub mod production_stage;
pub mod task;
pub mod user;
