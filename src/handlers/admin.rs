use crate::error::AppError;
use crate::middlewares::current_identity;
use crate::models::*;
use crate::services::{MembershipCatalogService, SubscriptionService, TransactionLedgerService};
use crate::utils::Identity;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;

fn require_admin(req: &HttpRequest) -> Result<Identity, AppError> {
    let identity = current_identity(req)?;
    if !identity.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(identity)
}

#[utoipa::path(
    get,
    path = "/admin/transactions/stale",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending transactions older than the pending window", body = [StaleTransactionResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_stale_transactions(
    ledger: web::Data<TransactionLedgerService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match ledger.list_stale(Utc::now()).await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/packages/{package_id}/permissions",
    tag = "admin",
    params(("package_id" = i32, Path, description = "Package id")),
    request_body = ReplacePackagePermissionsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Package with its new permission set", body = MembershipPackageResponse),
        (status = 400, description = "Unknown permission ids"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Package not found")
    )
)]
pub async fn replace_package_permissions(
    catalog: web::Data<MembershipCatalogService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<ReplacePackagePermissionsRequest>,
) -> Result<HttpResponse> {
    let identity = match require_admin(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };
    let package_id = path.into_inner();
    log::info!(
        "Admin {} replacing permissions of package {}",
        identity.account_id,
        package_id
    );

    match catalog
        .replace_package_permissions(package_id, request.into_inner().permission_ids)
        .await
    {
        Ok(package) => Ok(HttpResponse::Ok().json(ApiResponse::success(package))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/memberships/expire",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Number of memberships expired", body = ExpireMembershipsResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn expire_memberships(
    subscriptions: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match subscriptions.expire_memberships().await {
        Ok(expired_count) => Ok(HttpResponse::Ok().json(ApiResponse::success(
            ExpireMembershipsResponse { expired_count },
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/transactions/stale", web::get().to(list_stale_transactions))
            .route(
                "/packages/{package_id}/permissions",
                web::put().to(replace_package_permissions),
            )
            .route("/memberships/expire", web::post().to(expire_memberships)),
    );
}
