// Presentation layer - HTTP surface over the application services
pub mod app_state;
pub mod error;
pub mod handlers;
pub mod router;
