use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatcher::{Command, Dispatcher};
use crate::errors::PrintError;
use crate::printers::BackendId;
use crate::routes::respond;

#[derive(Debug, Default, Deserialize)]
pub struct ImageParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    pub text: Option<String>,
    pub size: Option<u32>,
    pub align: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DensityBody {
    pub density: Option<i64>,
}

fn parse_backend(raw: &str) -> Result<BackendId, HttpResponse> {
    raw.parse::<BackendId>().map_err(|e| {
        warn!("Rejecting request for unknown backend '{}'", raw);
        HttpResponse::BadRequest().json(e.error_response())
    })
}

fn invalid_argument(detail: String) -> HttpResponse {
    let err = PrintError::InvalidArgument(detail);
    warn!("Rejecting request: {}", err);
    HttpResponse::BadRequest().json(err.error_response())
}

/// Parses an optional JSON body. An empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, HttpResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| invalid_argument(format!("Malformed body: {}", e)))
}

#[post("/printer/{backend}/image")]
pub async fn print_image(
    dispatcher: web::Data<Arc<Dispatcher>>,
    path: web::Path<String>,
    req: HttpRequest,
    body: Bytes,
) -> impl Responder {
    let backend = match parse_backend(&path) {
        Ok(b) => b,
        Err(response) => return response,
    };
    let params = match web::Query::<ImageParams>::from_query(req.query_string()) {
        Ok(params) => params.into_inner(),
        Err(e) => return invalid_argument(format!("Malformed query: {}", e)),
    };
    info!(
        "Print image request for {} ({} bytes)",
        backend,
        body.len()
    );

    let image = (!body.is_empty()).then_some(body);
    let result = dispatcher
        .handle(Command::PrintImage {
            backend,
            image,
            width: params.width,
            height: params.height,
        })
        .await;
    respond(result)
}

#[post("/printer/text")]
pub async fn print_text(
    dispatcher: web::Data<Arc<Dispatcher>>,
    body: Bytes,
) -> impl Responder {
    let body: TextBody = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let result = dispatcher
        .handle(Command::PrintText {
            text: body.text,
            size: body.size,
            align: body.align,
        })
        .await;
    respond(result)
}

#[post("/printer/density")]
pub async fn set_density(
    dispatcher: web::Data<Arc<Dispatcher>>,
    body: Bytes,
) -> impl Responder {
    let body: DensityBody = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let result = dispatcher
        .handle(Command::SetDensity {
            density: body.density,
        })
        .await;
    respond(result)
}

#[get("/printer/{backend}/status")]
pub async fn check_status(
    dispatcher: web::Data<Arc<Dispatcher>>,
    path: web::Path<String>,
) -> impl Responder {
    let backend = match parse_backend(&path) {
        Ok(b) => b,
        Err(response) => return response,
    };
    let status = dispatcher.check_status(backend).await;
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "backend": backend,
        "status": status
    }))
}

#[post("/printer/{backend}/test-page")]
pub async fn print_test_page(
    dispatcher: web::Data<Arc<Dispatcher>>,
    path: web::Path<String>,
) -> impl Responder {
    let backend = match parse_backend(&path) {
        Ok(b) => b,
        Err(response) => return response,
    };
    respond(dispatcher.handle(Command::PrintTestPage { backend }).await)
}
