mod bus;
mod diff;
mod foreground;
mod protocol;
mod registry;
mod snapshot;
mod store_http;
