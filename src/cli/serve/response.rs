//! HTTP response writers.

use std::io::Read;

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::routes::Reply;
use crate::utils::mime::types::PLAIN;

/// Send a routed reply. `HEAD` requests get the headers only.
pub fn respond(request: Request, reply: Reply) -> Result<()> {
    if request.method() == &Method::Head {
        return send_head(request, reply.status, reply.content_type);
    }
    send_body(request, reply.status, reply.content_type, reply.body)
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let response = with_content_type(Response::empty(StatusCode(status)), content_type);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body).with_status_code(StatusCode(status));
    request.respond(with_content_type(response, content_type))?;
    Ok(())
}

fn with_content_type<R: Read>(response: Response<R>, content_type: &str) -> Response<R> {
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
