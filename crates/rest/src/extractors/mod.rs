//! Axum extractors.
//!
//! - [`Scoped`] - The scope granted by the access gate

mod scope;

pub use scope::Scoped;
