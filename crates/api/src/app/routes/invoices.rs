use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use invoicer_core::{DomainResult, InvoiceId};
use invoicer_invoicing::InvoiceAggregate;

use super::parse_id;
use crate::app::dto::{self, InvoiceResponse, MessageResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/:id/pdf", get(invoice_pdf))
}

fn invoice_response(status: StatusCode, agg: InvoiceAggregate) -> axum::response::Response {
    match InvoiceResponse::try_from(agg) {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Creates the invoice and any initial items together, then answers with
/// the assembled view.
pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateInvoiceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    let invoice = match services.store.create_invoice(body.into()).await {
        Ok(invoice) => invoice,
        Err(e) => return errors::domain_error_to_response(e),
    };
    info!(invoice_id = %invoice.id, customer_id = %invoice.customer_id, "invoice created");

    match services.assembler.assemble(invoice.id).await {
        Ok(agg) => invoice_response(StatusCode::CREATED, agg),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.assembler.assemble_all().await {
        Ok(aggregates) => {
            let body = aggregates
                .into_iter()
                .map(InvoiceResponse::try_from)
                .collect::<DomainResult<Vec<_>>>();
            match body {
                Ok(body) => (StatusCode::OK, Json(body)).into_response(),
                Err(e) => errors::domain_error_to_response(e),
            }
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.assembler.assemble(id).await {
        Ok(agg) => invoice_response(StatusCode::OK, agg),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateInvoiceRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: InvoiceId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rej) => return errors::body_rejection_to_response(rej),
    };

    if let Err(e) = services.store.update_invoice(id, body.into()).await {
        return errors::domain_error_to_response(e);
    }

    match services.assembler.assemble(id).await {
        Ok(agg) => invoice_response(StatusCode::OK, agg),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Deletes the invoice with its items.
pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.delete_invoice(id, true).await {
        Ok(()) => {
            info!(invoice_id = %id, "invoice deleted");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Invoice deleted",
                }),
            )
                .into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn invoice_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let agg = match services.assembler.assemble(id).await {
        Ok(agg) => agg,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = agg.total() {
        return errors::domain_error_to_response(e);
    }

    let pdf = match services.renderer.render_pdf(&agg).await {
        Ok(pdf) => pdf,
        Err(e) => return errors::render_error_to_response(e),
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"invoice_{id}.pdf\""),
            ),
        ],
        pdf,
    )
        .into_response()
}
