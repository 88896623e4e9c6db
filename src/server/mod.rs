mod handlers;
mod state;

pub use handlers::run_server;
