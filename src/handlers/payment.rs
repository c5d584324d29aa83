//! Browser redirects coming back from the payment gateway.
//!
//! Both endpoints are public: the payer arrives from PayPal without a bearer
//! token. Outcomes are reported by redirecting to the frontend.

use crate::error::AppError;
use crate::models::{CancelPaymentQuery, ExecutePaymentQuery};
use crate::services::{ExecutionOutcome, PurchaseService};
use actix_web::http::header;
use actix_web::{HttpResponse, Result, web};

fn redirect_to(base: &str, params: &[(&str, String)]) -> HttpResponse {
    let location = match reqwest::Url::parse(base) {
        Ok(mut url) => {
            if !params.is_empty() {
                url.query_pairs_mut()
                    .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
            }
            url.to_string()
        }
        Err(e) => {
            log::warn!("Redirect target {base} is not a valid URL: {e}");
            base.to_string()
        }
    };
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[utoipa::path(
    get,
    path = "/payment/execute",
    tag = "payment",
    params(
        ("paymentId" = String, Query, description = "Gateway payment id"),
        ("PayerID" = String, Query, description = "Payer approval token"),
        ("packageId" = Option<i32>, Query, description = "Informational; the recorded transaction wins"),
        ("validityDays" = Option<i32>, Query, description = "Informational; the recorded transaction wins")
    ),
    responses(
        (status = 302, description = "Redirect to the frontend success or failure page")
    )
)]
pub async fn execute_payment(
    purchase_service: web::Data<PurchaseService>,
    query: web::Query<ExecutePaymentQuery>,
) -> Result<HttpResponse> {
    let urls = purchase_service.urls().clone();

    match purchase_service.execute_payment(query.into_inner()).await {
        Ok(ExecutionOutcome::Completed { transaction, .. }) => Ok(redirect_to(
            &urls.success_redirect_url,
            &[("transactionId", transaction.id.to_string())],
        )),
        Ok(ExecutionOutcome::NotApproved { .. }) => Ok(redirect_to(
            &urls.failure_redirect_url,
            &[("error", "PAYMENT_NOT_APPROVED".to_string())],
        )),
        // repeated callback for a payment that is already applied
        Err(AppError::AlreadyProcessed(_)) => Ok(redirect_to(
            &urls.success_redirect_url,
            &[("status", "already_processed".to_string())],
        )),
        Err(e) => {
            log::error!("Payment execution failed: {e}");
            Ok(redirect_to(
                &urls.failure_redirect_url,
                &[("error", e.code().to_string())],
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/payment/cancel",
    tag = "payment",
    params(
        ("transactionId" = i32, Query, description = "Transaction the payer abandoned"),
        ("token" = Option<String>, Query, description = "Approval token PayPal appends to the cancel URL")
    ),
    responses(
        (status = 302, description = "Redirect to the frontend failure page")
    )
)]
pub async fn cancel_payment(
    purchase_service: web::Data<PurchaseService>,
    query: web::Query<CancelPaymentQuery>,
) -> Result<HttpResponse> {
    let urls = purchase_service.urls().clone();

    match purchase_service
        .cancel_payment(query.transaction_id, query.token.as_deref())
        .await
    {
        Ok(transaction) => Ok(redirect_to(
            &urls.failure_redirect_url,
            &[
                ("error", "PAYMENT_CANCELLED".to_string()),
                ("transactionId", transaction.id.to_string()),
            ],
        )),
        Err(e) => Ok(redirect_to(
            &urls.failure_redirect_url,
            &[("error", e.code().to_string())],
        )),
    }
}

pub fn payment_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payment")
            .route("/execute", web::get().to(execute_payment))
            .route("/cancel", web::get().to(cancel_payment)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(resp: &HttpResponse) -> String {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_redirect_appends_query() {
        let resp = redirect_to("https://app.example.com/done", &[("transactionId", "5".into())]);
        assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(location(&resp), "https://app.example.com/done?transactionId=5");
    }

    #[test]
    fn test_redirect_extends_existing_query() {
        let resp = redirect_to(
            "https://app.example.com/done?lang=en",
            &[("error", "X".into()), ("transactionId", "5".into())],
        );
        assert_eq!(
            location(&resp),
            "https://app.example.com/done?lang=en&error=X&transactionId=5"
        );
    }

    #[test]
    fn test_redirect_encodes_values() {
        let resp = redirect_to(
            "https://app.example.com/fail",
            &[("error", "a b&c=d".into())],
        );
        assert_eq!(location(&resp), "https://app.example.com/fail?error=a+b%26c%3Dd");
    }
}
