use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{BillingCycle, MembershipStatus, TransactionStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::membership::list_packages,
        handlers::membership::get_package,
        handlers::membership::get_order,
        handlers::membership::get_current_membership,
        handlers::membership::purchase_free,
        handlers::purchase::purchase,
        handlers::purchase::list_transactions,
        handlers::payment::execute_payment,
        handlers::payment::cancel_payment,
        handlers::admin::list_stale_transactions,
        handlers::admin::replace_package_permissions,
        handlers::admin::expire_memberships,
    ),
    components(
        schemas(
            BillingCycle,
            MembershipStatus,
            TransactionStatus,
            PermissionResponse,
            MembershipPackageResponse,
            OrderQuote,
            UserMembershipResponse,
            CurrentMembershipResponse,
            ReplacePackagePermissionsRequest,
            ExpireMembershipsResponse,
            PaymentTransactionResponse,
            StaleTransactionResponse,
            PurchaseRequest,
            PurchaseResponse,
            FreePurchaseResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "membership", description = "Membership catalog and quotes"),
        (name = "purchase", description = "Paid membership purchase"),
        (name = "payment", description = "Payment gateway redirects"),
        (name = "admin", description = "Administration"),
    ),
    info(
        title = "KidCare Membership API",
        version = "1.0.0",
        description = "Membership purchase and subscription REST API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
