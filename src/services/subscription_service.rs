use crate::entities::{
    MembershipStatus, membership_package_entity as mp, payment_transaction_entity as pt,
    permission_entity as perm, user_entity as users, user_membership_entity as um,
    user_permission_entity as up,
};
use crate::error::{AppError, AppResult};
use crate::models::{CurrentMembershipResponse, PermissionResponse};
use crate::services::MembershipCatalogService;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct SubscriptionService {
    pool: DatabaseConnection,
}

impl SubscriptionService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// The membership currently in force: status active and not past its end date.
    pub async fn find_active<C: ConnectionTrait>(
        db: &C,
        account_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<um::Model>> {
        let active = um::Entity::find()
            .filter(um::Column::UserId.eq(account_id))
            .filter(um::Column::Status.eq(MembershipStatus::Active))
            .filter(
                Condition::any()
                    .add(um::Column::EndDate.gt(now))
                    .add(um::Column::EndDate.is_null()),
            )
            .order_by_desc(um::Column::Id)
            .one(db)
            .await?;
        Ok(active)
    }

    /// Grant `package_id` to the account for a settled `transaction`.
    ///
    /// Must run inside the database transaction that settled `transaction`;
    /// the caller commits or rolls back everything together.
    ///
    /// - no active membership: new row for `validity_days`
    /// - same package: end date pushed out by the package's `validity_period`
    /// - other package: old row expired now, new row for `validity_days`
    pub async fn apply_purchase<C: ConnectionTrait>(
        db: &C,
        account_id: i32,
        package_id: i32,
        validity_days: i32,
        transaction: &pt::Model,
        now: DateTime<Utc>,
    ) -> AppResult<um::Model> {
        let user = users::Entity::find_by_id(account_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        // money is captured; a package retired since the order still applies
        let package = MembershipCatalogService::load_package(db, package_id).await?;

        let applied = match Self::find_active(db, account_id, now).await? {
            Some(current) if current.package_id == package.id => {
                let extended = current
                    .end_date
                    .map(|end| end + Duration::days(package.validity_period as i64));
                let mut am = current.into_active_model();
                am.end_date = Set(extended);
                am.payment_transaction_id = Set(Some(transaction.id));
                am.updated_at = Set(now);
                let renewed = am.update(db).await?;
                log::info!(
                    "Membership {} renewed for account {} until {:?}",
                    renewed.id,
                    account_id,
                    renewed.end_date
                );
                renewed
            }
            Some(current) => {
                let previous_id = current.id;
                let mut am = current.into_active_model();
                am.end_date = Set(Some(now));
                am.status = Set(MembershipStatus::Expired);
                am.updated_at = Set(now);
                am.update(db).await?;

                let created =
                    Self::insert_membership(db, account_id, &package, validity_days, transaction, now)
                        .await?;
                log::info!(
                    "Membership {} superseded by {} for account {}",
                    previous_id,
                    created.id,
                    account_id
                );
                created
            }
            None => {
                Self::insert_membership(db, account_id, &package, validity_days, transaction, now)
                    .await?
            }
        };

        let mut am = user.into_active_model();
        am.membership_package_id = Set(Some(package.id));
        am.updated_at = Set(now);
        am.update(db).await?;

        Ok(applied)
    }

    async fn insert_membership<C: ConnectionTrait>(
        db: &C,
        account_id: i32,
        package: &mp::Model,
        validity_days: i32,
        transaction: &pt::Model,
        now: DateTime<Utc>,
    ) -> AppResult<um::Model> {
        let created = um::ActiveModel {
            user_id: Set(account_id),
            package_id: Set(package.id),
            start_date: Set(now),
            end_date: Set(Some(now + Duration::days(validity_days as i64))),
            status: Set(MembershipStatus::Active),
            price_at_purchase: Set(package.price),
            yearly_price_at_purchase: Set(package.yearly_price),
            billing_cycle: Set(transaction.billing_cycle),
            payment_transaction_id: Set(Some(transaction.id)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        // permissions are frozen per membership; later catalog edits do not apply
        let permissions = MembershipCatalogService::package_permissions(db, package.id).await?;
        for permission in permissions {
            up::ActiveModel {
                user_membership_id: Set(created.id),
                user_id: Set(account_id),
                permission_id: Set(permission.id),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        Ok(created)
    }

    pub async fn current_membership(&self, account_id: i32) -> AppResult<CurrentMembershipResponse> {
        let membership = Self::find_active(&self.pool, account_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("No active membership".into()))?;

        let package_name = mp::Entity::find_by_id(membership.package_id)
            .one(&self.pool)
            .await?
            .map(|p| p.name)
            .unwrap_or_default();

        let granted: Vec<i32> = up::Entity::find()
            .filter(up::Column::UserMembershipId.eq(membership.id))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|p| p.permission_id)
            .collect();
        let permissions = if granted.is_empty() {
            Vec::new()
        } else {
            perm::Entity::find()
                .filter(perm::Column::Id.is_in(granted))
                .order_by_asc(perm::Column::Id)
                .all(&self.pool)
                .await?
                .into_iter()
                .map(PermissionResponse::from)
                .collect()
        };

        Ok(CurrentMembershipResponse {
            membership: membership.into(),
            package_name,
            permissions,
        })
    }

    /// 会员过期处理：active 且 end_date 已过的记录置为 expired，并清理用户的当前套餐指针
    pub async fn expire_memberships(&self) -> AppResult<u64> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let due = um::Entity::find()
            .filter(um::Column::Status.eq(MembershipStatus::Active))
            .filter(um::Column::EndDate.lte(now))
            .all(&txn)
            .await?;
        if due.is_empty() {
            txn.commit().await?;
            return Ok(0);
        }

        let ids: Vec<i32> = due.iter().map(|m| m.id).collect();
        let res = um::Entity::update_many()
            .col_expr(um::Column::Status, Expr::value(MembershipStatus::Expired))
            .col_expr(um::Column::UpdatedAt, Expr::value(now))
            .filter(um::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        for membership in &due {
            // only clear the pointer if nothing else took over
            if Self::find_active(&txn, membership.user_id, now).await?.is_some() {
                continue;
            }
            users::Entity::update_many()
                .col_expr(
                    users::Column::MembershipPackageId,
                    Expr::value(Option::<i32>::None),
                )
                .col_expr(users::Column::UpdatedAt, Expr::value(now))
                .filter(users::Column::Id.eq(membership.user_id))
                .filter(users::Column::MembershipPackageId.eq(membership.package_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(res.rows_affected)
    }
}
