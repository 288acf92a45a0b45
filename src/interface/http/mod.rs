pub mod activity;
pub mod admin_auth;
pub mod cleanup_handler;
pub mod monitoring;
pub mod problem;
pub mod settings_handler;
pub mod users_handler;
