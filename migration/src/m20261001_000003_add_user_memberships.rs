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
enum Permissions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum PaymentTransactions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum UserMemberships {
    Table,
    Id,
    UserId,
    PackageId,
    StartDate,
    EndDate,
    Status,
    PriceAtPurchase,
    YearlyPriceAtPurchase,
    BillingCycle,
    PaymentTransactionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserPermissions {
    Table,
    Id,
    UserMembershipId,
    UserId,
    PermissionId,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserMemberships::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserMemberships::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UserMemberships::PackageId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::PriceAtPurchase)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::YearlyPriceAtPurchase)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::BillingCycle)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::PaymentTransactionId)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserMemberships::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_memberships_user")
                            .from(UserMemberships::Table, UserMemberships::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_memberships_package")
                            .from(UserMemberships::Table, UserMemberships::PackageId)
                            .to(MembershipPackages::Table, MembershipPackages::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_memberships_transaction")
                            .from(
                                UserMemberships::Table,
                                UserMemberships::PaymentTransactionId,
                            )
                            .to(PaymentTransactions::Table, PaymentTransactions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_memberships_user_status")
                    .table(UserMemberships::Table)
                    .col(UserMemberships::UserId)
                    .col(UserMemberships::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPermissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPermissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserPermissions::UserMembershipId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserPermissions::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UserPermissions::PermissionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPermissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_permissions_membership")
                            .from(UserPermissions::Table, UserPermissions::UserMembershipId)
                            .to(UserMemberships::Table, UserMemberships::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_permissions_permission")
                            .from(UserPermissions::Table, UserPermissions::PermissionId)
                            .to(Permissions::Table, Permissions::Id),
                    )
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
                    .table(UserPermissions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(UserMemberships::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
