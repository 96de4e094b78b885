use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use invoicer_core::ItemId;

use super::parse_id;
use crate::app::dto::{self, ItemResponse, MessageResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item).get(list_items))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    match services.store.create_item(body.into()).await {
        Ok(item) => (StatusCode::CREATED, Json(ItemResponse::from(item))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store.list_items().await {
        Ok(items) => {
            let body: Vec<ItemResponse> = items.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.get_item(id).await {
        Ok(item) => (StatusCode::OK, Json(ItemResponse::from(item))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    match services.store.update_item(id, body.into()).await {
        Ok(item) => (StatusCode::OK, Json(ItemResponse::from(item))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.delete_item(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Item deleted",
            }),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
