use actix_web::HttpResponse;
use serde_json::json;

#[tracing::instrument(name = "Health check handler")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "OK" }))
}
