use std::str::FromStr;

use axum::Router;

use crate::app::errors;

pub mod customers;
pub mod invoices;
pub mod items;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/customers", customers::router())
        .nest("/invoices", invoices::router())
        .nest("/items", items::router())
}

/// Parse a path id, answering 400 `invalid_id` when it is not an integer.
fn parse_id<T: FromStr>(raw: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id(raw))
}
