use poem::{handler, web::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResp {
    status: &'static str,
}

#[handler]
pub fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "ok" })
}
