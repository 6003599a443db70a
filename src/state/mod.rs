//! State management module.
//!
//! Contains the session registry (shared live-connection state).

mod registry;

pub use registry::{ConnId, SessionRegistry};
