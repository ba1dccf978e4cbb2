//! Core data models for the EnteBus transit API.
//!
//! Each struct maps to a database table via `sqlx::FromRow` and serializes
//! as JSON via `serde`. Geometry columns travel as WKT strings; enum-like
//! columns carry their integer discriminant (see `enums`).

pub mod bus;
pub mod company;
pub mod enums;
pub mod executive;
pub mod landmark;
pub mod route;
