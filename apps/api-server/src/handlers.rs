//! HTTP routes for the `/book` resource.
//!
//! Handlers are generic over the repository so the router can be driven by
//! any `BookRepository`; production wires in `AnyRepo`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain::{Book, BookRepository, CoreError};
use serde::{Deserialize, Serialize};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState<R> {
    repo: Arc<R>,
}

impl<R> AppState<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo: Arc::new(repo),
        }
    }
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

/// Build the full application router, including request-id and tracing layers.
pub fn router<R: BookRepository + 'static>(state: AppState<R>) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route(
            "/book",
            get(get_all_books::<R>)
                .post(add_book::<R>)
                .delete(delete_all_books::<R>),
        )
        .route(
            "/book/:id",
            get(get_book::<R>)
                .put(update_book::<R>)
                .delete(delete_book::<R>),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}

/// Request body for create/update. Missing strings default to empty; a
/// client-supplied id is accepted but never stored.
#[derive(Deserialize)]
struct BookReq {
    #[serde(default)]
    #[allow(dead_code)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    author: String,
}

impl From<BookReq> for Book {
    fn from(req: BookReq) -> Self {
        Book::new(req.name, req.author)
    }
}

#[derive(Serialize)]
struct BookOut {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    author: String,
}

impl From<Book> for BookOut {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            name: book.name,
            author: book.author,
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(http_common::json_err(message))).into_response()
}

/// Decode a create/update body. The content type is not checked; only the
/// JSON itself has to be well formed.
fn decode_body(body: &Bytes) -> Result<BookReq, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(err = %e, "malformed request body");
        error_response(StatusCode::BAD_REQUEST, &format!("malformed request body: {e}"))
    })
}

/// Unwrap the `:id` segment, answering with `status` in the envelope when it
/// cannot be extracted (e.g. invalid UTF-8 after percent-decoding).
fn path_id(
    path: Result<Path<String>, PathRejection>,
    status: StatusCode,
) -> Result<String, Response> {
    path.map(|Path(id)| id).map_err(|rejection| {
        warn!(err = %rejection.body_text(), "invalid book id in path");
        error_response(status, &rejection.body_text())
    })
}

async fn get_all_books<R: BookRepository>(State(state): State<AppState<R>>) -> Response {
    match state.repo.get_all_books().await {
        Ok(books) => {
            let out: Vec<BookOut> = books.into_iter().map(BookOut::from).collect();
            (StatusCode::OK, Json(http_common::json_ok(out))).into_response()
        }
        Err(e) => {
            error!(err = %e, "list books error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn get_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let id = match path_id(path, StatusCode::NOT_FOUND) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.repo.get_book(&id).await {
        Ok(book) => (StatusCode::OK, Json(http_common::json_ok(BookOut::from(book)))).into_response(),
        Err(e) if e.is_not_found() => {
            warn!(id = %id, err = %e, "get book 404");
            error_response(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e) => {
            error!(id = %id, err = %e, "get book error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn add_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Response {
    let req = match decode_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.repo.add_book(req.into()).await {
        Ok(created) => {
            info!(id = %created.id, "book created");
            (
                StatusCode::CREATED,
                Json(http_common::json_ok(BookOut::from(created))),
            )
                .into_response()
        }
        Err(e) => {
            error!(err = %e, "create book error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn update_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Response {
    let id = match path_id(path, StatusCode::INTERNAL_SERVER_ERROR) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match decode_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.repo.update_book(&id, req.into()).await {
        Ok(()) => {
            info!(id = %id, "book updated");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            log_failure(&id, &e, "update book");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn delete_book<R: BookRepository>(
    State(state): State<AppState<R>>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let id = match path_id(path, StatusCode::BAD_REQUEST) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.repo.delete_book(&id).await {
        Ok(()) => {
            info!(id = %id, "book deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) if e.is_not_found() => {
            warn!(id = %id, err = %e, "delete book miss");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => {
            error!(id = %id, err = %e, "delete book error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn delete_all_books<R: BookRepository>(State(state): State<AppState<R>>) -> Response {
    match state.repo.delete_all_books().await {
        Ok(()) => {
            info!("all books deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(err = %e, "delete all books error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn log_failure(id: &str, e: &CoreError, action: &str) {
    if e.is_not_found() {
        warn!(id = %id, err = %e, "{action} miss");
    } else {
        error!(id = %id, err = %e, "{action} error");
    }
}
