//! Infrastructure layer: entity storage backends and the invoice read path.

pub mod assembler;
pub mod store;

pub use assembler::Assembler;
pub use store::{EntityStore, InMemoryStore, SqliteStore};
