mod background;
mod foreground;
mod helpers;
mod shared_host;
mod store;
