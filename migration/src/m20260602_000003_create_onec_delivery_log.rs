use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Per-order audit of every payload sent to 1C, success or not
        manager
            .create_table(
                Table::create()
                    .table(OnecDeliveryLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OnecDeliveryLog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::IntegrationId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::AccountName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OnecDeliveryLog::Inn).string_len(20).null())
                    .col(
                        ColumnDef::new(OnecDeliveryLog::SupplyId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::WildCode)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::OrderId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OnecDeliveryLog::NmId).big_integer().null())
                    .col(ColumnDef::new(OnecDeliveryLog::Price).double().null())
                    .col(
                        ColumnDef::new(OnecDeliveryLog::Count)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::ResponseData)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::ErrorDetails)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OnecDeliveryLog::CreatedAt)
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
                    .name("idx_onec_delivery_log_integration")
                    .table(OnecDeliveryLog::Table)
                    .col(OnecDeliveryLog::IntegrationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_onec_delivery_log_order")
                    .table(OnecDeliveryLog::Table)
                    .col(OnecDeliveryLog::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OnecDeliveryLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OnecDeliveryLog {
    Table,
    Id,
    IntegrationId,
    AccountName,
    Inn,
    SupplyId,
    WildCode,
    OrderId,
    NmId,
    Price,
    Count,
    Status,
    SentAt,
    ResponseData,
    ErrorDetails,
    CreatedAt,
}
