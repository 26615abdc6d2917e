use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HangingSupplies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HangingSupplies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::SupplyId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::Account)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::OrderData)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::ShippedOrders)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::ChangesLog)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::IsFictitiousDelivered)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::FictitiousDeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::FictitiousDeliveryOperator)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::Operator)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(HangingSupplies::CreatedAt)
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
                    .name("idx_hanging_supplies_supply_account")
                    .table(HangingSupplies::Table)
                    .col(HangingSupplies::SupplyId)
                    .col(HangingSupplies::Account)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HangingSupplies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HangingSupplies {
    Table,
    Id,
    SupplyId,
    Account,
    OrderData,
    ShippedOrders,
    ChangesLog,
    IsFictitiousDelivered,
    FictitiousDeliveredAt,
    FictitiousDeliveryOperator,
    Operator,
    CreatedAt,
}
