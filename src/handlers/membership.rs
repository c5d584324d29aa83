use crate::middlewares::current_identity;
use crate::models::*;
use crate::services::{MembershipCatalogService, PurchaseService, SubscriptionService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/membership-packages",
    tag = "membership",
    responses(
        (status = 200, description = "Active membership packages", body = [MembershipPackageResponse])
    )
)]
pub async fn list_packages(catalog: web::Data<MembershipCatalogService>) -> Result<HttpResponse> {
    match catalog.list_packages().await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/membership-packages/{package_id}",
    tag = "membership",
    params(("package_id" = i32, Path, description = "Package id")),
    responses(
        (status = 200, description = "Package detail", body = MembershipPackageResponse),
        (status = 404, description = "Package not found")
    )
)]
pub async fn get_package(
    catalog: web::Data<MembershipCatalogService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match catalog.get_package(path.into_inner()).await {
        Ok(package) => Ok(HttpResponse::Ok().json(ApiResponse::success(package))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/order/{package_id}",
    tag = "membership",
    params(
        ("package_id" = i32, Path, description = "Package to quote"),
        ("paymentType" = Option<String>, Query, description = "monthly (default) or yearly")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Quote including carried-over days", body = OrderQuote),
        (status = 400, description = "Free packages are not orderable"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Package or account not found")
    )
)]
pub async fn get_order(
    purchase_service: web::Data<PurchaseService>,
    req: HttpRequest,
    path: web::Path<i32>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match purchase_service
        .preview_order(identity.account_id, path.into_inner(), query.payment_type)
        .await
    {
        Ok(quote) => Ok(HttpResponse::Ok().json(ApiResponse::success(quote))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/memberships/current",
    tag = "membership",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active membership with its permissions", body = CurrentMembershipResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No active membership")
    )
)]
pub async fn get_current_membership(
    subscriptions: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match subscriptions.current_membership(identity.account_id).await {
        Ok(current) => Ok(HttpResponse::Ok().json(ApiResponse::success(current))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/membership/free/{package_id}",
    tag = "membership",
    params(("package_id" = i32, Path, description = "Free package to activate")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Free membership activated", body = FreePurchaseResponse),
        (status = 400, description = "Package is not free"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Package or account not found")
    )
)]
pub async fn purchase_free(
    purchase_service: web::Data<PurchaseService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match purchase_service
        .purchase_free(identity.account_id, path.into_inner())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(ApiResponse::success(resp))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn membership_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/membership-packages", web::get().to(list_packages))
        .route("/membership-packages/{package_id}", web::get().to(get_package))
        .route("/order/{package_id}", web::get().to(get_order))
        .route("/memberships/current", web::get().to(get_current_membership))
        .route("/membership/free/{package_id}", web::post().to(purchase_free));
}
