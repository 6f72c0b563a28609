pub mod background;
pub mod config;
pub mod error;
pub mod event;
pub mod foreground;
pub mod protocol;
pub mod registry;
pub mod store;

#[cfg(test)]
mod tests;

pub const RELAY_HOSTNAME: &str = "127.0.0.1";
pub const RELAY_DEFAULT_PORT: u16 = 19880;
pub const RELAY_WS_BASE_URL: &str = const_format::concatcp!("ws://", RELAY_HOSTNAME);
