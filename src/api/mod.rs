use std::sync::Arc;

use poem::{
    get,
    http::Method,
    middleware::{CatchPanic, Cors, Tracing},
    post, Endpoint, EndpointExt, Route,
};

use crate::config::ServiceConfig;

pub mod compress;
pub mod health;
pub mod params;

// 12h
const CORS_MAX_AGE_SECS: i32 = 12 * 60 * 60;

fn cors(config: &ServiceConfig) -> Cors {
    Cors::new()
        .allow_origin(config.allowed_origin.as_str())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(["Origin", "Content-Type", "Authorization"])
        .expose_headers(["Content-Length"])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE_SECS)
}

pub fn build_app(config: Arc<ServiceConfig>) -> impl Endpoint {
    Route::new()
        .at("/compress", post(compress::compress))
        .at("/health", get(health::health))
        .with(cors(&config))
        .with(Tracing)
        .with(CatchPanic::new())
        .data(config)
}
