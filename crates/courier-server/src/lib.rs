pub mod client;
pub mod handlers;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server;

pub use client::ClientHub;
pub use handlers::HandlerState;
pub use registry::SessionRegistry;
pub use server::{start, ServerConfig, ServerHandle};
