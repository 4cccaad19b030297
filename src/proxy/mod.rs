//! HTTP serving surface for the relay

mod handler;
mod server;

pub use server::{build_router, run_server, RelayState};
