//! HTTP API handlers for geosect-server

pub mod files;
pub mod health;
pub mod sections;

pub use files::file_routes;
pub use health::health_routes;
pub use sections::section_routes;
