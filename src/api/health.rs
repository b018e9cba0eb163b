use crate::RqDbPool;
use actix_web::{get, web, HttpResponse, Responder};
use diesel::prelude::*;
use serde_json::json;

/// Health check endpoint for load balancers
#[get("")]
pub async fn health_check(pool: RqDbPool) -> impl Responder {
    let database = match pool.get() {
        Ok(mut conn) => diesel::sql_query("SELECT 1").execute(&mut conn).is_ok(),
        Err(_) => false,
    };

    if database {
        HttpResponse::Ok().json(json!({
            "status": "healthy",
            "database": "connected"
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "database": "disconnected"
        }))
    }
}

/// Liveness check - simple check to see if the app is alive
#[get("/live")]
pub async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn routes() -> actix_web::Scope {
    web::scope("/health")
        .service(health_check)
        .service(liveness_check)
}
