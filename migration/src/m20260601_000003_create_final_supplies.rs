use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinalSupplies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinalSupplies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FinalSupplies::SupplyId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinalSupplies::Account)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinalSupplies::SupplyName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinalSupplies::CreatedAt)
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
                    .name("idx_final_supplies_supply_account")
                    .table(FinalSupplies::Table)
                    .col(FinalSupplies::SupplyId)
                    .col(FinalSupplies::Account)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Latest-per-account lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_final_supplies_account_created")
                    .table(FinalSupplies::Table)
                    .col(FinalSupplies::Account)
                    .col(FinalSupplies::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FinalSupplies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FinalSupplies {
    Table,
    Id,
    SupplyId,
    Account,
    SupplyName,
    CreatedAt,
}
