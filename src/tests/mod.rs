mod common;
mod server_routes;
