use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum MembershipPackages {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum PaymentTransactions {
    Table,
    Id,
    UserId,
    PackageId,
    BillingCycle,
    Amount,
    ValidityDays,
    ExternalPaymentId,
    Status,
    TransactionDate,
    ApprovalLink,
    PreviousPackageName,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::PackageId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::BillingCycle)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::ValidityDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::ExternalPaymentId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::TransactionDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::ApprovalLink)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::PreviousPackageName)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_transactions_user")
                            .from(PaymentTransactions::Table, PaymentTransactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_transactions_package")
                            .from(PaymentTransactions::Table, PaymentTransactions::PackageId)
                            .to(MembershipPackages::Table, MembershipPackages::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // external payment id is the join key with the gateway's own record
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_ptx_external_payment")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::ExternalPaymentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ptx_user_status")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::UserId)
                    .col(PaymentTransactions::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(PaymentTransactions::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
