pub mod config;
pub mod engine;
pub mod error;
pub mod relation;
pub mod telemetry;
pub mod workflows;
