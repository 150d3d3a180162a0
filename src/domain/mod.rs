// Domain layer - Pure models and rules, no I/O
pub mod alarm;
pub mod events;
pub mod history;
pub mod layout;
pub mod rate;
pub mod stopwatch;
pub mod sync_message;
pub mod telemetry;
