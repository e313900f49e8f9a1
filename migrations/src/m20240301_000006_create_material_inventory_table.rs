use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000006_create_material_inventory_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MaterialInventory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MaterialInventory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::MaterialType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::Unit)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::ReorderPoint)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::SupplierName)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MaterialInventory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MaterialInventory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MaterialInventory {
    Table,
    Id,
    Name,
    MaterialType,
    Quantity,
    Unit,
    ReorderPoint,
    SupplierName,
    Deleted,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}
