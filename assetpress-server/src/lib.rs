//! Assetpress HTTP Server
//!
//! Accept loop and prefix mounting for the negotiating file server.

mod server;

pub use server::{StaticService, bind, run_server, serve};
