use actix_web::{get, web, HttpResponse, Responder};
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::Dispatcher;

#[get("/device/model")]
pub async fn device_model(dispatcher: web::Data<Arc<Dispatcher>>) -> impl Responder {
    let model = dispatcher.device_model();
    info!("Device: {}", model);
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "model": model
    }))
}
