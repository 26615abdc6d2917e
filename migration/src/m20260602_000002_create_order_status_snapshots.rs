use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Local mirror of WB assembly tasks; serves ERP formatting when the
        // live order fetch misses an id, and NEW-order detection.
        manager
            .create_table(
                Table::create()
                    .table(OrderStatusSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::OrderId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::NmId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::ConvertedPrice)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::Account)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::SupplierStatus)
                            .string_len(50)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::WbStatus)
                            .string_len(50)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusSnapshots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_status_snapshots_order_account")
                    .table(OrderStatusSnapshots::Table)
                    .col(OrderStatusSnapshots::OrderId)
                    .col(OrderStatusSnapshots::Account)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderStatusSnapshots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OrderStatusSnapshots {
    Table,
    Id,
    OrderId,
    NmId,
    ConvertedPrice,
    Account,
    SupplierStatus,
    WbStatus,
    CreatedAt,
    UpdatedAt,
}
