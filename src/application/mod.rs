// Application layer - Use cases over the domain, ports to infrastructure
pub mod event_dispatch;
pub mod history_service;
pub mod mirror_store;
pub mod preferences_repository;
pub mod preferences_service;
pub mod rate_monitor;
pub mod state_store;
pub mod sync_bridge;
pub mod telemetry_ingest;
