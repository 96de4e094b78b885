//! `invoicer-core` — shared building blocks for the invoicing service.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, EntityKind};
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, InvoiceId, ItemId};
