// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod file_store;
pub mod host_bridge;
pub mod stream_window;
