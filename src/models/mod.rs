// src/models/mod.rs
pub mod messages;
pub mod service;
pub mod telemetry;

pub use messages::*;
pub use service::*;
pub use telemetry::*;
