// src/responses.rs
use crate::errors::ServerError;
use astra::{Body, Response, ResponseBuilder};
use maud::Markup;
use serde::Serialize;

pub fn html_response(markup: Markup) -> Result<Response, ServerError> {
    let body = markup.into_string();

    ResponseBuilder::new()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(body))
        .map_err(|_| ServerError::InternalError)
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> Result<Response, ServerError> {
    let body = serde_json::to_string(value).map_err(|_| ServerError::InternalError)?;

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body))
        .map_err(|_| ServerError::InternalError)
}

/// Convert a ServerError into a proper response
pub fn error_to_response(err: ServerError) -> Response {
    let (status, message) = match &err {
        ServerError::NotFound => (404, "Not Found".to_string()),
        ServerError::BadRequest(msg) => (400, msg.clone()),
        ServerError::Conflict(msg) => (409, msg.clone()),
        ServerError::DbError(msg) => (500, msg.clone()),
        ServerError::InternalError => (500, "Internal Server Error".to_string()),
    };

    let body = serde_json::json!({ "error": message }).to_string();

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
}
