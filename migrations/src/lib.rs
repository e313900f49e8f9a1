pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users_table;
mod m20240301_000002_create_customers_table;
mod m20240301_000003_create_products_table;
mod m20240301_000004_create_orders_tables;
mod m20240301_000005_create_production_tables;
mod m20240301_000006_create_material_inventory_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_customers_table::Migration),
            Box::new(m20240301_000003_create_products_table::Migration),
            Box::new(m20240301_000004_create_orders_tables::Migration),
            Box::new(m20240301_000005_create_production_tables::Migration),
            Box::new(m20240301_000006_create_material_inventory_table::Migration),
        ]
    }
}
