use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Persisted operation results; lets a client that lost its connection
        // poll for the outcome instead of re-submitting against the WB API.
        manager
            .create_table(
                Table::create()
                    .table(SupplyOperations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SupplyOperations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::OperationId)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::Operator)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::RequestPayload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::ResponseData)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::ErrorMessage)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SupplyOperations::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SupplyOperations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SupplyOperations {
    Table,
    Id,
    OperationId,
    Operator,
    RequestPayload,
    ResponseData,
    Status,
    ErrorMessage,
    CreatedAt,
    CompletedAt,
}
