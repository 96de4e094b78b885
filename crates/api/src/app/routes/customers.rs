use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use invoicer_core::CustomerId;

use super::parse_id;
use crate::app::dto::{self, CustomerResponse, MessageResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_customer).get(list_customers))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateCustomerRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    match services.store.create_customer(body.into()).await {
        Ok(customer) => {
            info!(customer_id = %customer.id, "customer created");
            (StatusCode::CREATED, Json(CustomerResponse::from(customer))).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.list_customers().await {
        Ok(customers) => {
            let body: Vec<CustomerResponse> = customers.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.get_customer(id).await {
        Ok(customer) => (StatusCode::OK, Json(CustomerResponse::from(customer))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateCustomerRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    match services.store.update_customer(id, body.into()).await {
        Ok(customer) => (StatusCode::OK, Json(CustomerResponse::from(customer))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Deletes the customer with all of its invoices and their items.
pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.delete_customer(id, true).await {
        Ok(()) => {
            info!(customer_id = %id, "customer deleted");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Customer deleted",
                }),
            )
                .into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
