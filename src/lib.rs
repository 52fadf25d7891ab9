pub mod api;
pub mod cli;
pub mod covers;

/// User agent for outbound HTTP requests (cover lookups).
pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
