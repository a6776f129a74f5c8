pub mod projector;
pub mod telemetry;
pub mod threads;
