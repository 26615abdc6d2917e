use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only history of every status an assembly task passed through
        manager
            .create_table(
                Table::create()
                    .table(OrderStatusLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderStatusLog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::OrderId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::Status)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::SupplyId)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::Account)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::Operator)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderStatusLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Duplicate (order_id, status, supply_id, account) tuples must collapse
        // into one row even when supply_id is NULL, so the index is created raw
        // with NULLS NOT DISTINCT (no builder switch for it).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_order_status_log_unique_tuple \
                 ON order_status_log (order_id, status, supply_id, account) \
                 NULLS NOT DISTINCT",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_status_log_order_id")
                    .table(OrderStatusLog::Table)
                    .col(OrderStatusLog::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_status_log_supply")
                    .table(OrderStatusLog::Table)
                    .col(OrderStatusLog::SupplyId)
                    .col(OrderStatusLog::Account)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderStatusLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OrderStatusLog {
    Table,
    Id,
    OrderId,
    Status,
    SupplyId,
    Account,
    Operator,
    CreatedAt,
}
