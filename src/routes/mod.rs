// Route modules organization

use actix_web::http::StatusCode;
use actix_web::HttpResponse;

use crate::dispatcher::OperationResult;

pub mod device_routes;
pub mod printer_routes;

// Re-export all routes for convenience
pub use device_routes::*;
pub use printer_routes::*;

/// Turns a dispatcher result into the JSON envelope callers expect.
pub(crate) fn respond(result: OperationResult) -> HttpResponse {
    match result {
        Ok(message) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": message
        })),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(e.error_response())
        }
    }
}
