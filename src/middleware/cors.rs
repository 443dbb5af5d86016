use tower_http::cors::{Any, CorsLayer};

/// Browser dashboard clients connect from arbitrary origins.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
