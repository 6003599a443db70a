//! Network layer: listeners and per-connection WebSocket tasks.

mod connection;
mod gateway;
mod limit;

pub use connection::Connection;
pub use gateway::Gateway;
