pub mod bridge;
pub mod client;
pub mod config;
pub mod registry;
pub mod server;
pub mod session;
pub mod texml;

pub use texml_realtime_types as types;
pub use client::{connect, Client, ServerRx};
pub use config::Config;
pub use registry::SessionRegistry;
pub use session::CallSession;
