pub mod bus;
pub mod client;
pub mod config;
pub mod http;
pub mod ipc;
pub mod port;
pub mod store;
