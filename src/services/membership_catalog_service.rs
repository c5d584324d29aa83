use crate::entities::{
    PackageStatus, membership_package_entity as mp, package_permission_entity as pp,
    permission_entity as perm,
};
use crate::error::{AppError, AppResult};
use crate::models::MembershipPackageResponse;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct MembershipCatalogService {
    pool: DatabaseConnection,
}

impl MembershipCatalogService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Load a package by id, regardless of status.
    pub async fn load_package<C: ConnectionTrait>(db: &C, package_id: i32) -> AppResult<mp::Model> {
        mp::Entity::find_by_id(package_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Membership package not found".into()))
    }

    /// Load a package that can still be sold. Inactive packages read as missing.
    pub async fn load_active_package<C: ConnectionTrait>(
        db: &C,
        package_id: i32,
    ) -> AppResult<mp::Model> {
        let package = Self::load_package(db, package_id).await?;
        if package.status != PackageStatus::Active {
            return Err(AppError::NotFound("Membership package not found".into()));
        }
        Ok(package)
    }

    /// Permissions attached to a package, ordered by id.
    pub async fn package_permissions<C: ConnectionTrait>(
        db: &C,
        package_id: i32,
    ) -> AppResult<Vec<perm::Model>> {
        let ids: Vec<i32> = pp::Entity::find()
            .filter(pp::Column::PackageId.eq(package_id))
            .all(db)
            .await?
            .into_iter()
            .map(|link| link.permission_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = perm::Entity::find()
            .filter(perm::Column::Id.is_in(ids))
            .order_by_asc(perm::Column::Id)
            .all(db)
            .await?;
        Ok(list)
    }

    /// 对外展示的套餐（仅 active）
    pub async fn list_packages(&self) -> AppResult<Vec<MembershipPackageResponse>> {
        let packages = mp::Entity::find()
            .filter(mp::Column::Status.eq(PackageStatus::Active))
            .order_by_asc(mp::Column::Price)
            .order_by_asc(mp::Column::Id)
            .all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(packages.len());
        for package in packages {
            let permissions = Self::package_permissions(&self.pool, package.id).await?;
            out.push(MembershipPackageResponse::from_model(package, permissions));
        }
        Ok(out)
    }

    pub async fn get_package(&self, package_id: i32) -> AppResult<MembershipPackageResponse> {
        let package = Self::load_active_package(&self.pool, package_id).await?;
        let permissions = Self::package_permissions(&self.pool, package.id).await?;
        Ok(MembershipPackageResponse::from_model(package, permissions))
    }

    /// Replace the permission set of a package. Existing memberships keep the
    /// permissions copied at purchase time.
    pub async fn replace_package_permissions(
        &self,
        package_id: i32,
        permission_ids: Vec<i32>,
    ) -> AppResult<MembershipPackageResponse> {
        let wanted: BTreeSet<i32> = permission_ids.into_iter().collect();

        let txn = self.pool.begin().await?;
        let package = Self::load_package(&txn, package_id).await?;

        if !wanted.is_empty() {
            let found = perm::Entity::find()
                .filter(perm::Column::Id.is_in(wanted.iter().copied()))
                .all(&txn)
                .await?;
            if found.len() != wanted.len() {
                let known: BTreeSet<i32> = found.iter().map(|p| p.id).collect();
                let missing: Vec<String> = wanted
                    .difference(&known)
                    .map(|id| id.to_string())
                    .collect();
                return Err(AppError::InvalidRequest(format!(
                    "Unknown permission ids: {}",
                    missing.join(",")
                )));
            }
        }

        pp::Entity::delete_many()
            .filter(pp::Column::PackageId.eq(package_id))
            .exec(&txn)
            .await?;
        for permission_id in &wanted {
            pp::ActiveModel {
                package_id: Set(package_id),
                permission_id: Set(*permission_id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        let permissions = Self::package_permissions(&txn, package_id).await?;
        txn.commit().await?;

        log::info!(
            "Package {} permissions replaced: {} entries",
            package_id,
            permissions.len()
        );
        Ok(MembershipPackageResponse::from_model(package, permissions))
    }
}
