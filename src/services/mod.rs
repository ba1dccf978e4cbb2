pub mod auth;
pub mod geometry;
pub mod locks;
pub mod pictures;
pub mod telemetry;
