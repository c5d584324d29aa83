use crate::middlewares::current_identity;
use crate::models::*;
use crate::services::PurchaseService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/purchase",
    tag = "purchase",
    request_body = PurchaseRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Gateway approval URL for the pending transaction", body = PurchaseResponse),
        (status = 400, description = "Free packages are not orderable"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Package or account not found"),
        (status = 409, description = "Another purchase is pending"),
        (status = 502, description = "Payment gateway error"),
        (status = 504, description = "Payment gateway timeout")
    )
)]
pub async fn purchase(
    purchase_service: web::Data<PurchaseService>,
    req: HttpRequest,
    request: web::Json<PurchaseRequest>,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match purchase_service
        .begin_purchase(identity.account_id, request.into_inner())
        .await
    {
        Ok(resp) => Ok(HttpResponse::Ok().json(ApiResponse::success(resp))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/transactions",
    tag = "purchase",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's payment transactions, newest first", body = [PaymentTransactionResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_transactions(
    purchase_service: web::Data<PurchaseService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match purchase_service.transactions(identity.account_id).await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn purchase_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/purchase", web::post().to(purchase))
        .route("/transactions", web::get().to(list_transactions));
}
