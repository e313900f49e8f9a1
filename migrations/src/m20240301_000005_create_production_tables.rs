use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000005_create_production_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductionStages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductionStages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductionStages::Description).text().null())
                    .col(
                        ColumnDef::new(ProductionStages::Status)
                            .string_len(20)
                            .not_null()
                            .default("PLANNED"),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductionStages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_production_stages_order_id")
                            .from(ProductionStages::Table, ProductionStages::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_production_stages_order_id")
                    .table(ProductionStages::Table)
                    .col(ProductionStages::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Tasks::ProductionStageId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tasks::OrderId).integer().not_null())
                    .col(ColumnDef::new(Tasks::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Tasks::Description).text().null())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(20)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Tasks::AssignedToId).integer().null())
                    .col(
                        ColumnDef::new(Tasks::DueDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tasks::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tasks::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_production_stage_id")
                            .from(Tasks::Table, Tasks::ProductionStageId)
                            .to(ProductionStages::Table, ProductionStages::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_order_id")
                            .from(Tasks::Table, Tasks::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_assigned_to_id")
                            .from(Tasks::Table, Tasks::AssignedToId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_production_stage_id")
                    .table(Tasks::Table)
                    .col(Tasks::ProductionStageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_order_id")
                    .table(Tasks::Table)
                    .col(Tasks::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductionStages::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ProductionStages {
    Table,
    Id,
    OrderId,
    Name,
    Description,
    Status,
    StartDate,
    EndDate,
    Deleted,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    ProductionStageId,
    OrderId,
    Title,
    Description,
    Status,
    AssignedToId,
    DueDate,
    Deleted,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Orders {
    Table,
    Id,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
