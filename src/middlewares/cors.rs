use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        // the parent app and the PayPal return pages are served from different origins
        .allowed_origin_fn(|_, _req_head| true)
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
