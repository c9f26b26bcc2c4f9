//! HTTP transport for the entity service.
//!
//! Each registered entity gets the same set of routes under `/{entity}/`. Handlers only
//! extract request parts and call the [`EntityService`]; errors render through [`ApiError`].

use std::collections::HashMap;
use std::num::IntErrorKind;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::data_store::{DEFAULT_PAGE_LIMIT, DataStore, Page};
use crate::service::{BulkCreateResponse, BulkDeleteResponse, CountResponse};
use crate::validate::BODY_FIELD;
use crate::{ApiError, Catalog, EntityService, ErrorKind};

/// Header carrying the handling time of a request, in seconds.
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

type Body = Result<Json<Value>, JsonRejection>;

fn json_body(body: Body) -> Result<Value, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::bad_request(format!(
            "invalid field '{}': {}",
            BODY_FIELD,
            rejection.body_text()
        ))
    })
}

type Params = Result<Query<HashMap<String, String>>, QueryRejection>;

fn query_params(params: Params) -> Result<HashMap<String, String>, ApiError> {
    params.map(|Query(params)| params).map_err(|rejection| {
        ApiError::bad_request(format!("invalid query: {}", rejection.body_text()))
    })
}

/// Reads an integer page parameter; values beyond `i64` saturate and are clamped later.
fn page_param(
    params: &HashMap<String, String>,
    name: &str,
    default: i64,
) -> Result<i64, ApiError> {
    let Some(text) = params.get(name) else {
        return Ok(default);
    };
    match text.trim().parse::<i64>() {
        Ok(value) => Ok(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(ApiError::bad_request(format!(
                "invalid query parameter '{}': expected an integer, got '{}'",
                name, text
            ))),
        },
    }
}

async fn create_record<S: DataStore>(
    State(service): State<EntityService<S>>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    Ok(Json(service.create(&body).await?))
}

async fn get_record<S: DataStore>(
    State(service): State<EntityService<S>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(service.get_by_id(&id).await?))
}

async fn list_records<S: DataStore>(
    State(service): State<EntityService<S>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(service.list().await?))
}

async fn count_records<S: DataStore>(
    State(service): State<EntityService<S>>,
) -> Result<Json<CountResponse>, ApiError> {
    Ok(Json(service.count().await?))
}

async fn page_records<S: DataStore>(
    State(service): State<EntityService<S>>,
    params: Params,
) -> Result<Json<Page>, ApiError> {
    let params = query_params(params)?;
    let skip = page_param(&params, "skip", 0)?;
    let limit = page_param(&params, "limit", DEFAULT_PAGE_LIMIT as i64)?;
    Ok(Json(service.list_page(skip, limit).await?))
}

async fn search_records<S: DataStore>(
    State(service): State<EntityService<S>>,
    params: Params,
) -> Result<Json<Vec<Value>>, ApiError> {
    let params = query_params(params)?;
    Ok(Json(service.search(&params).await?))
}

async fn update_record<S: DataStore>(
    State(service): State<EntityService<S>>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    Ok(Json(service.update(&id, &body).await?))
}

async fn delete_record<S: DataStore>(
    State(service): State<EntityService<S>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(service.delete(&id).await?))
}

async fn bulk_create_records<S: DataStore>(
    State(service): State<EntityService<S>>,
    body: Body,
) -> Result<Json<BulkCreateResponse>, ApiError> {
    let body = json_body(body)?;
    Ok(Json(service.bulk_create(&body).await?))
}

async fn bulk_delete_records<S: DataStore>(
    State(service): State<EntityService<S>>,
    body: Body,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    let body = json_body(body)?;
    Ok(Json(service.bulk_delete(&body).await?))
}

async fn unknown_route(request: Request) -> ApiError {
    ApiError::new(
        ErrorKind::NotFound,
        format!("no route for {} {}", request.method(), request.uri().path()),
    )
}

/// Logs every request and reports how long it took in [`PROCESS_TIME_HEADER`].
pub async fn trace_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let elapsed = start.elapsed();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "request handled"
    );
    response
}

/// The routes of one entity type.
pub fn create_entity_router<S: DataStore>(service: EntityService<S>) -> Router {
    let base = format!("/{}/", service.name());
    Router::new()
        .route(&base, get(list_records::<S>).post(create_record::<S>))
        .route(&format!("{}count/", base), get(count_records::<S>))
        .route(&format!("{}paginated/", base), get(page_records::<S>))
        .route(&format!("{}search/", base), get(search_records::<S>))
        .route(
            &format!("{}bulk/", base),
            post(bulk_create_records::<S>).delete(bulk_delete_records::<S>),
        )
        .route(
            &format!("{}:id/", base),
            get(get_record::<S>)
                .put(update_record::<S>)
                .delete(delete_record::<S>),
        )
        .with_state(service)
}

/// The routes of every entity in `catalog`, wrapped in request tracing.
pub fn create_router<S: DataStore>(catalog: &Catalog<S>) -> Router {
    catalog
        .services()
        .fold(Router::new(), |router, service| {
            router.merge(create_entity_router(service.clone()))
        })
        .fallback(unknown_route)
        .layer(middleware::from_fn(trace_requests))
}
