//! HTTP API handlers

pub mod admin;
pub mod health;
pub mod projects;

pub use admin::admin_routes;
pub use health::health_routes;
pub use projects::project_routes;
