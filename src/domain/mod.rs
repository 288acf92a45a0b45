pub mod activity;
pub mod defaults;
pub mod errors;
pub mod preferences;
pub mod search;
