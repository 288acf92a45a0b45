pub mod dto;
pub mod lifecycle;
pub mod metrics;
pub mod preferences_service;
