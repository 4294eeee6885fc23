// src/services/mod.rs
pub mod api_service;
pub mod channel;
pub mod directions;
pub mod workflow;
