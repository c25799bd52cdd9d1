//! Types shared between the HTTP layer, the persistence layer and the
//! insight generator.

pub mod api;
pub mod models;
